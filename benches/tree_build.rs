use criterion::{black_box, criterion_group, criterion_main, Criterion};
use proteus::engine::DynamicForm;
use proteus::schema::validate_config;
use serde_json::json;

/// A wide config: `sections` fieldsets of 10 inputs each, plus a repeater.
fn wide_config(sections: usize) -> proteus::domain::FormConfig {
    let mut elements = Vec::new();
    for section in 0..sections {
        let children: Vec<_> = (0..10)
            .map(|field| {
                json!({
                    "key": format!("field{field}"),
                    "type": "input",
                    "value": "seed",
                    "validators": [{"name": "required"}, {"name": "maxLength", "value": 64}]
                })
            })
            .collect();
        elements.push(json!({
            "key": format!("section{section}"),
            "type": "fieldset",
            "children": children
        }));
    }
    elements.push(json!({
        "key": "rows",
        "type": "repeater",
        "value": [{}, {}, {}],
        "children": [{"key": "label", "type": "input"}]
    }));

    validate_config(&json!({ "elements": elements })).expect("bench config is valid")
}

fn bench_tree_build(c: &mut Criterion) {
    let small = wide_config(2);
    let large = wide_config(10);

    c.bench_function("build_20_fields", |b| {
        b.iter(|| DynamicForm::from_config(black_box(small.clone())).unwrap())
    });
    c.bench_function("build_100_fields", |b| {
        b.iter(|| DynamicForm::from_config(black_box(large.clone())).unwrap())
    });
}

criterion_group!(benches, bench_tree_build);
criterion_main!(benches);
