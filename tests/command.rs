// Command surface tests: the walkthrough transcript end to end.
use probe_map::command::{CommandError, Outcome, Session, WalkEvent, WALKTHROUGH};
use probe_map::{ConfigError, MapError};

fn rendered(session: &mut Session, script: &str) -> Vec<String> {
    session
        .run_script(script)
        .into_iter()
        .map(|(line, res)| match res {
            Ok(out) => format!("{line} => {out}"),
            Err(e) => format!("{line} => failed: {e}"),
        })
        .collect()
}

// Test: the full walkthrough.
// Verifies: each policy outcome, the restart after deleting the cursor key,
// and that a second take of the same key fails with NotFound.
#[test]
fn walkthrough_transcript() {
    let mut s = Session::new();
    let results = s.run_script(WALKTHROUGH);
    let outcomes: Vec<_> = results.iter().map(|(_, r)| r).collect();

    assert!(matches!(outcomes[0], Ok(Outcome::Created(c)) if !c.preallocate));
    assert!(matches!(outcomes[1], Ok(Outcome::Updated)));
    assert!(matches!(
        outcomes[2],
        Err(CommandError::Map(MapError::AlreadyExists))
    ));
    assert!(matches!(outcomes[3], Err(CommandError::Map(MapError::NotFound))));
    assert!(matches!(outcomes[4], Ok(Outcome::Value(1234))));
    assert!(matches!(outcomes[5], Ok(Outcome::Deleted)));
    for out in &outcomes[6..10] {
        assert!(matches!(out, Ok(Outcome::Updated)));
    }

    let Ok(Outcome::Walk(walk)) = outcomes[10] else {
        panic!("iterate should walk: {:?}", outcomes[10]);
    };
    assert_eq!(
        walk,
        &[1, 2, 3, 4].map(WalkEvent::Key).to_vec()
    );

    let Ok(Outcome::Walk(walk)) = outcomes[11] else {
        panic!("iterate-delete should walk: {:?}", outcomes[11]);
    };
    assert_eq!(
        walk,
        &vec![
            WalkEvent::Key(1),
            WalkEvent::Key(2),
            WalkEvent::Deleted(2),
            WalkEvent::Restarted,
            WalkEvent::Key(1),
            WalkEvent::Key(3),
            WalkEvent::Key(4),
        ]
    );

    assert!(matches!(outcomes[12], Ok(Outcome::Taken(1235))));
    assert!(matches!(outcomes[13], Err(CommandError::Map(MapError::NotFound))));
    assert_eq!(outcomes.len(), 14);
}

#[test]
fn transcript_lines_read_like_the_lesson() {
    let mut s = Session::new();
    let lines = rendered(&mut s, WALKTHROUGH);
    assert_eq!(lines[1], "put 1 1234 any => map updated with new element");
    assert_eq!(lines[4], "get 1 => value read from the map: '1234'");
    assert_eq!(lines[5], "del 1 => element deleted from map");
    assert_eq!(lines[12], "take 1 => value from the map: '1235'");
    assert!(lines[13].starts_with("take 1 => failed:"));
}

#[test]
fn counters_and_len() {
    let mut s = Session::new();
    let lines = rendered(
        &mut s,
        "create-map 2 4 8\n\
         # counters start at zero\n\
         put 7 0 noexist\n\
         incr 7 100\n\
         incr 7 -1\n\
         incr 8 1\n\
         len\n",
    );
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[2], "incr 7 100 => counter is now: '100'");
    assert_eq!(lines[3], "incr 7 -1 => counter is now: '99'");
    assert!(lines[4].starts_with("incr 8 1 => failed:"));
    assert_eq!(lines[5], "len => 1 entries");
}

#[test]
fn take_can_be_unsupported() {
    let mut s = Session::new();
    let results = s.run_script("create-map 4 4 4 no-take\nput 1 1\ntake 1\nget 1");
    assert!(matches!(
        results[2].1,
        Err(CommandError::Map(MapError::Unsupported(_)))
    ));
    assert!(matches!(results[3].1, Ok(Outcome::Value(1))));
}

#[test]
fn create_map_replaces_the_current_map() {
    let mut s = Session::new();
    s.run_script("create-map 4 4 4\nput 1 1");
    assert_eq!(s.map().map(|m| m.len()), Some(1));
    s.run_script("create-map 4 4 4");
    assert_eq!(s.map().map(|m| m.len()), Some(0));
}

#[test]
fn capacity_is_enforced_through_commands() {
    let mut s = Session::new();
    let results = s.run_script("create-map 1 4 4\nput 1 1\nput 2 2\nput 1 9 exist\nget 1");
    assert!(matches!(
        results[2].1,
        Err(CommandError::Map(MapError::CapacityExceeded))
    ));
    assert!(matches!(results[4].1, Ok(Outcome::Value(9))));
}

#[test]
fn oversized_create_map_fails_cleanly() {
    let mut s = Session::new();
    let results = s.run_script("create-map 18446744073709551615 4 4\nget 1");
    assert!(matches!(
        results[0].1,
        Err(CommandError::Config(ConfigError::CapacityTooLarge { .. }))
    ));
    assert!(matches!(results[1].1, Err(CommandError::NoMap)));
}
