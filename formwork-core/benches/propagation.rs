//! Benchmark: Change propagation through forms

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use formwork_core::prelude::*;
use serde_json::{json, Value};

fn required(value: &Value) -> Option<ValidationError> {
    value
        .as_str()
        .is_some_and(str::is_empty)
        .then(|| ValidationError::new("required", "Required"))
}

fn wide_form(fields: usize) -> GroupNode {
    let schema = (0..fields).fold(GroupSchema::new(), |schema, i| {
        schema.field(format!("f{i}"), FieldConfig::new("x").validator(required))
    });
    GroupNode::new(schema)
}

fn benchmark_leaf_write(c: &mut Criterion) {
    let form = wide_form(50);
    let field = form.field_at("f0").unwrap();
    let mut n = 0u64;

    c.bench_function("leaf_write_with_validation", |b| {
        b.iter(|| {
            n += 1;
            field.set_value(black_box(json!(format!("v{n}"))));
        });
    });
}

fn benchmark_computed_chain(c: &mut Criterion) {
    let form = GroupNode::new(
        GroupSchema::new()
            .field("price", FieldConfig::new(0))
            .field("quantity", FieldConfig::new(1))
            .field("total", FieldConfig::new(0))
            .field("tax", FieldConfig::new(0)),
    );
    let _rules = form.apply_behavior_schema(|b| {
        b.compute_from(&["price", "quantity"], "total", |v| {
            json!(v[0].as_i64().unwrap_or(0) * v[1].as_i64().unwrap_or(0))
        });
        b.compute_from(&["total"], "tax", |v| json!(v[0].as_i64().unwrap_or(0) / 4));
    });
    let price = form.field_at("price").unwrap();
    let mut n = 0i64;

    c.bench_function("computed_chain", |b| {
        b.iter(|| {
            n += 1;
            price.set_value(json!(n));
            black_box(form.get_value());
        });
    });
}

fn benchmark_form_value(c: &mut Criterion) {
    let mut group = c.benchmark_group("form_value");
    for size in [10usize, 100, 1000] {
        let form = wide_form(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &form, |b, form| {
            b.iter(|| black_box(form.get_value()));
        });
    }
    group.finish();
}

fn benchmark_list_push(c: &mut Criterion) {
    c.bench_function("list_push_with_schema", |b| {
        b.iter(|| {
            let list = ArrayNode::new(ArraySchema::new(
                GroupSchema::new().field("sku", FieldConfig::new("")),
            ));
            let _schema = list.apply_validation_schema(|v| {
                v.field("sku", |value, _| required(value));
            });
            for _ in 0..20 {
                list.push(None);
            }
            black_box(list.invalid())
        });
    });
}

criterion_group!(
    benches,
    benchmark_leaf_write,
    benchmark_computed_chain,
    benchmark_form_value,
    benchmark_list_push
);
criterion_main!(benches);
