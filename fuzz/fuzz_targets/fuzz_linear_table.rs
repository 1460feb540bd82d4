#![no_main]

use arbitrary::Arbitrary;
use fluct_core::tags::KEY;
use fluct_core::{Combiner, Composite, Operation, Source, Table, Value};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum TableOp {
    Insert(u8),
    Remove(u8),
    SetKey { key: Option<u8>, value: u8 },
    Reset(Vec<u8>),
    Arithmetic(i8),
}

impl TableOp {
    fn to_source(&self, priority: f64) -> Source {
        let (value, op): (Value, Operation) = match self {
            TableOp::Insert(v) => (Value::from(f64::from(*v)), Operation::Insert),
            TableOp::Remove(v) => (Value::from(f64::from(*v)), Operation::Remove),
            TableOp::SetKey { value, .. } => (Value::from(f64::from(*value)), Operation::SetKey),
            TableOp::Reset(items) => (
                Value::from(Table::from_items(items.iter().map(|v| Value::from(f64::from(*v))))),
                Operation::Set,
            ),
            TableOp::Arithmetic(v) => (Value::from(f64::from(*v)), Operation::Add),
        };
        let source = Source::new(value).with_priority(priority).with_operation(op);
        if let TableOp::SetKey { key: Some(key), .. } = self {
            source.add_tag(KEY, format!("k{key}"));
        }
        source
    }
}

fuzz_target!(|ops: Vec<TableOp>| {
    let seed = Table::from_items([Value::from(1.0)]);
    let composite = Composite::new(seed, Combiner::LinearTable).expect("table default");
    for (i, op) in ops.iter().take(128).enumerate() {
        let source = op.to_source(i as f64);
        let outcome = composite.add_source(&source);
        if matches!(op, TableOp::Arithmetic(_)) {
            assert!(outcome.is_err());
            let _ = composite.remove_source(&source);
        }
    }

    if let Ok(value) = composite.read() {
        let table = value.as_table().expect("LinearTable yields tables");
        let inserts = ops.iter().filter(|op| matches!(op, TableOp::Insert(_))).count();
        let resets: usize = ops
            .iter()
            .take(128)
            .map(|op| match op {
                TableOp::Reset(items) => items.len(),
                _ => 0,
            })
            .sum();
        assert!(table.len() <= 1 + inserts + resets);
    }
    assert!(composite.default_value().as_table().is_some_and(|t| t.len() == 1));
});
