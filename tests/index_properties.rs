//! Property tests: random operation sequences checked against a `BTreeMap`.

use std::collections::BTreeMap;
use std::io::Cursor;

use pagetree::{
    CountMeasure, Direction, Error, Index, IndexBuilder, MaxMeasure, MinMeasure, Ray, StreamPageAllocator,
    SumMeasure,
};
use proptest::prelude::*;

type Item = (i32, i64);

#[derive(Debug, Clone)]
enum Op {
    Add(i32, i64),
    Replace(i32, i64),
    Remove(i32),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0i32..300, -1000i64..1000).prop_map(|(k, v)| Op::Add(k, v)),
        1 => (0i32..300, -1000i64..1000).prop_map(|(k, v)| Op::Replace(k, v)),
        2 => (0i32..300).prop_map(Op::Remove),
    ]
}

fn builder() -> IndexBuilder<i32, Item> {
    IndexBuilder::new(|item: &Item| item.0)
        .measure(CountMeasure)
        .measure(SumMeasure::new("sum", |item: &Item| item.1))
        .measure(MinMeasure::new("min", |item: &Item| item.1))
        .measure(MaxMeasure::new("max", |item: &Item| item.1))
}

fn apply(index: &mut Index<i32, Item>, model: &mut BTreeMap<i32, i64>, op: Op) {
    match op {
        Op::Add(k, v) => match index.add((k, v)) {
            Ok(()) => assert!(model.insert(k, v).is_none()),
            Err(Error::DuplicateKey) => assert!(model.contains_key(&k)),
            Err(e) => panic!("unexpected add error: {}", e),
        },
        Op::Replace(k, v) => match index.replace((k, v)) {
            Ok(old) => assert_eq!(model.insert(k, v), Some(old.1)),
            Err(Error::KeyNotFound) => assert!(!model.contains_key(&k)),
            Err(e) => panic!("unexpected replace error: {}", e),
        },
        Op::Remove(k) => {
            let removed = index.remove(&k).unwrap().map(|item| item.1);
            assert_eq!(removed, model.remove(&k));
        }
    }
}

fn assert_matches_model(index: &Index<i32, Item>, model: &BTreeMap<i32, i64>) {
    index.verify().unwrap();
    assert_eq!(index.len(), model.len());

    let scanned: Vec<Item> = index.iter().unwrap().map(|entry| entry.unwrap().1).collect();
    let expected: Vec<Item> = model.iter().map(|(k, v)| (*k, *v)).collect();
    assert_eq!(scanned, expected);

    assert_eq!(index.measure("count").unwrap(), Some(model.len() as i64));
    assert_eq!(index.measure("sum").unwrap(), Some(model.values().sum::<i64>()));
    assert_eq!(index.measure("min").unwrap(), Some(model.values().copied().min().unwrap_or(i64::MAX)));
    assert_eq!(index.measure("max").unwrap(), Some(model.values().copied().max().unwrap_or(i64::MIN)));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn random_operations_match_model(
        page_size in 4usize..9,
        ops in prop::collection::vec(op_strategy(), 0..400),
    ) {
        let mut index = builder().page_size(page_size).build().unwrap();
        let mut model = BTreeMap::new();

        for op in ops {
            apply(&mut index, &mut model, op);
        }
        assert_matches_model(&index, &model);
    }

    #[test]
    fn rays_match_model_ranges(
        keys in prop::collection::btree_set(0i32..1000, 0..200),
        point in -10i32..1010,
    ) {
        let mut index = builder().page_size(4).build().unwrap();
        for &k in &keys {
            index.add((k, k as i64)).unwrap();
        }

        let up: Vec<i32> = index
            .iter_from(&Ray::new(point, Direction::Positive))
            .unwrap()
            .map(|entry| entry.unwrap().0)
            .collect();
        let down: Vec<i32> = index
            .iter_from(&Ray::new(point, Direction::Negative))
            .unwrap()
            .map(|entry| entry.unwrap().0)
            .collect();

        prop_assert_eq!(up, keys.range(point..).copied().collect::<Vec<_>>());
        prop_assert_eq!(down, keys.range(..=point).rev().copied().collect::<Vec<_>>());
        prop_assert_eq!(index.seek(&point).unwrap().is_exact(), keys.contains(&point));
    }

    #[test]
    fn serialized_index_matches_model(
        ops in prop::collection::vec(op_strategy(), 0..300),
        bloom in any::<bool>(),
    ) {
        let mut index = builder().page_size(5).bloom_filter(bloom).build().unwrap();
        let mut model = BTreeMap::new();
        for op in ops {
            apply(&mut index, &mut model, op);
        }

        let mut allocator = StreamPageAllocator::new(Cursor::new(Vec::new()));
        index.serialize(&mut allocator).unwrap();
        let bytes = allocator.into_inner().into_inner();

        let reopened = builder().open_stream(Cursor::new(bytes)).unwrap();
        assert_matches_model(&reopened, &model);
        for k in 0..300 {
            prop_assert_eq!(reopened.get(&k).unwrap().map(|item| item.1), model.get(&k).copied());
        }
    }
}
