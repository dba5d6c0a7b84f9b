use std::collections::HashMap;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use atelier_auth::{
    AccessGrant, AccessRow, AccessSource, Action, AuthzError, CompanyRole, CompanyVisibility,
    EffectiveAccess, Principal, decide, resolve_access,
};
use atelier_core::{CompanyId, CompanyStatus, UserId};

/// Map-backed access source (no locking) to isolate resolver cost.
struct MapSource {
    companies: HashMap<CompanyId, CompanyVisibility>,
    roles: HashMap<(CompanyId, UserId), CompanyRole>,
}

impl AccessSource for MapSource {
    fn lookup_company(
        &self,
        company_id: CompanyId,
    ) -> Result<Option<CompanyVisibility>, AuthzError> {
        Ok(self.companies.get(&company_id).copied())
    }

    fn lookup_access(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<Option<AccessRow>, AuthzError> {
        Ok(self.companies.get(&company_id).map(|c| AccessRow {
            status: c.status,
            is_deleted: c.is_deleted,
            role: self.roles.get(&(company_id, user_id)).copied(),
        }))
    }
}

fn bench_decide(c: &mut Criterion) {
    let company = CompanyId::new();
    let user = UserId::new();
    let actions = [
        Action::ViewCompany,
        Action::DeleteCompany,
        Action::UpdateEmployee {
            current: CompanyRole::Reader,
            requested: CompanyRole::Creator,
        },
        Action::CreateTag,
    ];

    let mut group = c.benchmark_group("decide");
    for grant in [
        AccessGrant::Superuser,
        AccessGrant::Member(CompanyRole::Creator),
        AccessGrant::PublicGuest,
    ] {
        let access = EffectiveAccess::new(user, company, grant);
        let id = BenchmarkId::from_parameter(format!("{grant:?}"));
        group.bench_with_input(id, &access, |b, access| {
            b.iter(|| {
                for action in &actions {
                    black_box(decide(black_box(access), action));
                }
            })
        });
    }
    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let mut companies = HashMap::new();
    let mut roles = HashMap::new();
    let user = UserId::new();
    let mut ids = Vec::new();
    for i in 0..1_000 {
        let id = CompanyId::new();
        let status = if i % 2 == 0 { CompanyStatus::Public } else { CompanyStatus::Private };
        companies.insert(id, CompanyVisibility { status, is_deleted: false });
        if i % 3 == 0 {
            roles.insert((id, user), CompanyRole::Creator);
        }
        ids.push(id);
    }
    let source = MapSource { companies, roles };
    let principal = Principal::user(user);

    c.bench_function("resolve_access/1k_companies", |b| {
        b.iter(|| {
            for id in &ids {
                let _ = black_box(resolve_access(&source, &principal, *id));
            }
        })
    });
}

criterion_group!(benches, bench_decide, bench_resolve);
criterion_main!(benches);
