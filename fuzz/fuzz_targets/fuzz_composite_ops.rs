#![no_main]

use arbitrary::Arbitrary;
use fluct_core::{Combiner, Composite, Operation, Source, Value};
use libfuzzer_sys::fuzz_target;

const SOURCES: usize = 6;
const COMPOSITES: usize = 3;

#[derive(Arbitrary, Debug)]
enum FuzzValue {
    Bool(bool),
    Number(i16),
    Text(u8),
}

impl FuzzValue {
    fn to_value(&self) -> Value {
        match self {
            FuzzValue::Bool(b) => Value::Bool(*b),
            FuzzValue::Number(n) => Value::from(f64::from(*n)),
            FuzzValue::Text(t) => Value::from(format!("t{t}")),
        }
    }
}

#[derive(Arbitrary, Debug)]
enum FuzzOp {
    Attach { composite: u8, source: u8 },
    Detach { composite: u8, source: u8 },
    Update { source: u8, value: FuzzValue },
    Priority { source: u8, priority: Option<i8> },
    Operation { source: u8, op: u8 },
    Halt { composite: u8, halted: bool },
    Read { composite: u8 },
    Resolve { composite: u8 },
    Dispose { source: u8 },
}

fn combiner(selector: u8) -> Combiner {
    match selector % 7 {
        0 => Combiner::Linear,
        1 => Combiner::AllTrue,
        2 => Combiner::AnyTrue,
        3 => Combiner::FirstSet,
        4 => Combiner::LastSet,
        5 => Combiner::Single,
        _ => Combiner::random_seeded(u64::from(selector)),
    }
}

fn default_for(combiner: &Combiner) -> Value {
    match combiner {
        Combiner::AllTrue | Combiner::AnyTrue => Value::Bool(false),
        _ => Value::from(0.0),
    }
}

fuzz_target!(|input: (Vec<u8>, Vec<FuzzOp>)| {
    let (selectors, ops) = input;
    let composites: Vec<Composite> = (0..COMPOSITES)
        .map(|i| {
            let combiner = combiner(selectors.get(i).copied().unwrap_or(0));
            let default = default_for(&combiner);
            Composite::new(default, combiner).expect("non-table defaults always build")
        })
        .collect();
    let mut sources: Vec<Source> = (0..SOURCES).map(|i| Source::new(i as f64)).collect();

    for op in ops.iter().take(256) {
        match op {
            FuzzOp::Attach { composite, source } => {
                let _ = composites[*composite as usize % COMPOSITES]
                    .add_source(&sources[*source as usize % SOURCES]);
            }
            FuzzOp::Detach { composite, source } => {
                let _ = composites[*composite as usize % COMPOSITES]
                    .remove_source(&sources[*source as usize % SOURCES]);
            }
            FuzzOp::Update { source, value } => {
                sources[*source as usize % SOURCES].update(value.to_value());
            }
            FuzzOp::Priority { source, priority } => {
                sources[*source as usize % SOURCES].set_priority(priority.map(f64::from));
            }
            FuzzOp::Operation { source, op } => {
                let op = Operation::ALL[*op as usize % Operation::ALL.len()];
                sources[*source as usize % SOURCES].add_tag(fluct_core::tags::OPERATION, op);
            }
            FuzzOp::Halt { composite, halted } => {
                composites[*composite as usize % COMPOSITES].halt(*halted);
            }
            FuzzOp::Read { composite } => {
                let composite = &composites[*composite as usize % COMPOSITES];
                if let Ok(value) = composite.read() {
                    assert_eq!(value.kind(), composite.default_value().kind());
                    if !composite.is_dirty() {
                        let version = composite.version();
                        assert!(composite.read().is_ok());
                        assert_eq!(composite.version(), version);
                    }
                }
            }
            FuzzOp::Resolve { composite } => {
                let composite = &composites[*composite as usize % COMPOSITES];
                let halted = composite.is_halted();
                let outcome = composite.resolve();
                if halted {
                    assert!(outcome.is_err());
                }
            }
            FuzzOp::Dispose { source } => {
                let index = *source as usize % SOURCES;
                sources[index].dispose();
                for composite in &composites {
                    assert!(!composite.contains(&sources[index]));
                }
                sources[index] = Source::new(0.0);
            }
        }
    }
});
