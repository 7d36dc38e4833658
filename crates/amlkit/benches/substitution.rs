use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use amlkit::{ParameterSubstitution, ServerContext, Value};

const AML_TEMPLATE: &str = "<AML><Item type='Part' action='get'><item_number condition='in'>@0</item_number><name condition='like'>@1</name><state>@2</state></Item></AML>";
const SQL_TEMPLATE: &str = "select id from innovator.PART where item_number in @0 and name like @1 -- @2";

fn substitution() -> ParameterSubstitution {
    let mut sub = ParameterSubstitution::new();
    sub.add_parameter("0", Value::list(["A-100", "A-101", "B'200", "C<300"]));
    sub.add_parameter("1", "Bolt & Nut*");
    sub.add_parameter("2", "Released");
    sub
}

fn bench_aml(c: &mut Criterion) {
    let context = ServerContext::default();
    let mut sub = substitution();
    c.bench_function("amlkit_substitute_aml", |b| {
        b.iter(|| sub.substitute(black_box(AML_TEMPLATE), &context))
    });
}

fn bench_sql(c: &mut Criterion) {
    let context = ServerContext::default();
    let mut sub = substitution();
    c.bench_function("amlkit_substitute_sql", |b| {
        b.iter(|| sub.substitute(black_box(SQL_TEMPLATE), &context))
    });
}

criterion_group!(benches, bench_aml, bench_sql);
criterion_main!(benches);
