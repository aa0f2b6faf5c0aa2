use super::*;

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

fn small_config() -> TrieConfig {
    TrieConfig {
        initial_capacity: 64,
        ..TrieConfig::default()
    }
}

/// Structural invariants every built trie must satisfy.
fn validate_trie<V>(t: &DoubleArrayTrie<V>) {
    assert_eq!(t.alloc_size(), t.size(), "arrays must be compacted");
    assert_eq!(t.progress(), t.key_size(), "every key becomes one leaf");
    assert!(t.base()[0] >= 1, "root offset must be positive");
    assert_eq!(t.check()[0], 0, "slot 0 is never owned");
    assert_ne!(t.check()[t.size() - 1], 0, "last slot must be in use");

    let mut leaves = BTreeSet::new();
    for (idx, (&b, &c)) in t.base().iter().zip(t.check()).enumerate().skip(1) {
        if c == 0 {
            assert_eq!(b, 0, "free slot {idx} must be empty");
            continue;
        }
        assert!(c >= 1 && (c as usize) <= idx, "owner of slot {idx} out of range");
        if b < 0 {
            assert_eq!(idx, c as usize, "leaf at {idx} must be a terminal slot");
            assert!(leaves.insert(-(b as i64) - 1), "leaf index reused");
        }
    }
    assert_eq!(leaves.len(), t.key_size());
}

/// Seeded generator over a small alphabet so keys share many prefixes.
fn seeded_keys(seed: u64, n: usize) -> Vec<String> {
    const DICT: &[char] = &['a', 'b', 'c', 'd', 'e', 'f', 'g', 'é', '一', '举'];
    let mut rng = StdRng::seed_from_u64(seed);
    let mut set = BTreeSet::new();
    while set.len() < n {
        let len = rng.gen_range(1..=8);
        let key: String = (0..len).map(|_| DICT[rng.gen_range(0..DICT.len())]).collect();
        set.insert(key);
    }
    set.into_iter().collect()
}

fn key_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            4 => prop::char::range('a', 'e'),
            1 => prop::char::range('\u{4e00}', '\u{4e05}'),
            1 => any::<char>(),
        ],
        0..10,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

fn key_set_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(key_strategy(), 1..80).prop_map(|set| set.into_iter().collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_key_found_at_its_index(keys in key_set_strategy()) {
        let values: Vec<usize> = (0..keys.len()).map(|i| i * 7).collect();
        let trie = DoubleArrayTrie::build_with_values_and_config(&keys, values, &small_config())
            .unwrap();
        validate_trie(&trie);

        for (i, key) in keys.iter().enumerate() {
            if key.is_empty() {
                prop_assert_eq!(trie.index_of(key), None);
                continue;
            }
            prop_assert_eq!(trie.index_of(key), Some(i));
            prop_assert_eq!(trie.get_value(key), Some(&(i * 7)));
        }
    }

    #[test]
    fn absent_keys_never_found(keys in key_set_strategy(), probes in prop::collection::vec(key_strategy(), 1..40)) {
        let trie = DoubleArrayTrie::build_with_config(&keys, &small_config()).unwrap();
        let stored: BTreeSet<&String> = keys.iter().collect();

        for probe in &probes {
            let lookup = trie.lookup(probe);
            prop_assert!(lookup.is_ok());
            if stored.contains(probe) && !probe.is_empty() {
                prop_assert!(matches!(lookup, Ok(Lookup::Found(_))));
            } else {
                prop_assert_eq!(trie.index_of(probe), None);
            }
            let extended = format!("{probe}\u{10FFFF}");
            if !stored.contains(&extended) {
                prop_assert_eq!(trie.index_of(&extended), None);
            }
        }
    }

    #[test]
    fn prefix_lookup_matches_key_set(keys in key_set_strategy(), probe in key_strategy()) {
        let trie = DoubleArrayTrie::build_with_config(&keys, &small_config()).unwrap();
        let expected = if probe.is_empty() {
            Lookup::Missing
        } else if let Some(i) = keys.iter().position(|k| *k == probe) {
            Lookup::Found(i)
        } else if keys.iter().any(|k| k.starts_with(probe.as_str())) {
            Lookup::Prefix
        } else {
            Lookup::Missing
        };
        prop_assert_eq!(trie.lookup(&probe), Ok(expected));
    }

    #[test]
    fn snapshot_round_trip(keys in key_set_strategy()) {
        let values: Vec<String> = keys.iter().map(|k| k.to_uppercase()).collect();
        let trie = DoubleArrayTrie::build_with_values_and_config(&keys, values, &small_config())
            .unwrap();
        let restored = DoubleArrayTrie::<String>::from_bytes(&trie.to_bytes().unwrap()).unwrap();
        prop_assert_eq!(&restored, &trie);
        for key in &keys {
            prop_assert_eq!(restored.get_value(key), trie.get_value(key));
        }
    }

    #[test]
    fn builds_are_deterministic(keys in key_set_strategy()) {
        let a = DoubleArrayTrie::build_with_config(&keys, &small_config()).unwrap();
        let b = DoubleArrayTrie::build_with_config(&keys, &small_config()).unwrap();
        prop_assert_eq!(a.base(), b.base());
        prop_assert_eq!(a.check(), b.check());
        prop_assert_eq!(a.size(), b.size());
    }

    #[test]
    fn sorted_build_matches_presorted(keys in key_set_strategy(), seed in any::<u64>()) {
        let mut shuffled = keys.clone();
        let mut rng = StdRng::seed_from_u64(seed);
        for i in (1..shuffled.len()).rev() {
            shuffled.swap(i, rng.gen_range(0..=i));
        }
        let a = DoubleArrayTrie::build_sorted_with_config(&shuffled, &small_config()).unwrap();
        let b = DoubleArrayTrie::build_with_config(&keys, &small_config()).unwrap();
        prop_assert_eq!(a, b);
    }
}

#[test]
fn seeded_dictionary() {
    let keys = seeded_keys(42, 20_000);
    let trie = DoubleArrayTrie::build(&keys).unwrap();
    validate_trie(&trie);
    for (i, key) in keys.iter().enumerate() {
        assert_eq!(trie.index_of(key), Some(i));
    }

    let other = seeded_keys(7, 2_000);
    for key in other.iter().filter(|k| keys.binary_search(k).is_err()) {
        assert_eq!(trie.index_of(key), None);
    }
}

#[test]
fn seeded_dictionary_file_round_trip() {
    let keys = seeded_keys(1234, 5_000);
    let values: Vec<u32> = (0..keys.len() as u32).collect();
    let trie = DoubleArrayTrie::build_with_values(&keys, values).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dict.dat");
    trie.store(&path).unwrap();
    let loaded = DoubleArrayTrie::<u32>::load(&path).unwrap();

    assert_eq!(loaded, trie);
    for (i, key) in keys.iter().enumerate().step_by(37) {
        assert_eq!(loaded.get_value(key), Some(&(i as u32)));
    }
}

/// An event seen by [`EventCapture`]: target plus recorded fields.
#[derive(Debug, Clone)]
struct CapturedEvent {
    target: String,
    level: tracing::Level,
    fields: HashMap<String, String>,
}

#[derive(Clone, Default)]
struct EventStore(Arc<Mutex<Vec<CapturedEvent>>>);

impl EventStore {
    fn push(&self, event: CapturedEvent) {
        self.0.lock().unwrap().push(event);
    }

    fn find(&self, message: &str) -> Option<CapturedEvent> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.fields.get("message").map(String::as_str) == Some(message))
            .cloned()
    }
}

struct FieldVisitor<'a>(&'a mut HashMap<String, String>);

impl tracing::field::Visit for FieldVisitor<'_> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{value:?}"));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), value.to_string());
    }
}

/// Layer recording every event into an [`EventStore`].
struct EventCapture(EventStore);

impl<S: tracing::Subscriber> Layer<S> for EventCapture {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = HashMap::new();
        event.record(&mut FieldVisitor(&mut fields));
        self.0.push(CapturedEvent {
            target: event.metadata().target().to_string(),
            level: *event.metadata().level(),
            fields,
        });
    }
}

fn capture_events() -> (EventStore, tracing::subscriber::DefaultGuard) {
    let store = EventStore::default();
    let subscriber = tracing_subscriber::registry().with(EventCapture(store.clone()));
    (store, tracing::subscriber::set_default(subscriber))
}

#[test]
fn build_emits_tracing_events() {
    let (events, _guard) = capture_events();

    let trie = DoubleArrayTrie::build_with_config(&seeded_keys(5, 100), &small_config()).unwrap();
    assert_eq!(trie.key_size(), 100);

    let built = events.find("built double-array trie").unwrap();
    assert_eq!(built.target, "darts_trie::build");
    assert_eq!(built.level, tracing::Level::INFO);
    assert_eq!(built.fields["keys"], "100");
    assert_eq!(built.fields["progress"], "100");
    assert_eq!(built.fields["size"], trie.size().to_string());

    let grew = events.find("grew arrays").unwrap();
    assert_eq!(grew.level, tracing::Level::DEBUG);
    assert!(grew.fields.contains_key("alloc_size"));
}

#[test]
fn snapshot_io_emits_tracing_events() {
    let (events, _guard) = capture_events();

    let trie = DoubleArrayTrie::build(&seeded_keys(9, 50)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.dat");
    trie.store(&path).unwrap();
    DoubleArrayTrie::<()>::load(&path).unwrap();

    for message in ["stored snapshot", "loaded snapshot"] {
        let event = events.find(message).unwrap();
        assert_eq!(event.target, "darts_trie::serial");
        assert_eq!(event.fields["keys"], "50");
    }
}
