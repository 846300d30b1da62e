//! Line-oriented command surface for driving a map by hand.
//!
//! Keys and values are written as integers (decimal, optionally negative, or
//! `0x` hex) and encoded little-endian into the map's configured widths, the
//! way the C walkthrough passes `int` keys and values by pointer.
//!
//! ```text
//! create-map <capacity> <key_size> <value_size> [no-prealloc] [no-take]
//! put <key> <value> [any|noexist|exist]
//! get <key>
//! del <key>
//! take <key>
//! incr <key> <delta>
//! iterate
//! iterate-delete <key>
//! len
//! ```

use crate::config::MapConfig;
use crate::counter;
use crate::error::{ConfigError, MapError};
use crate::policy::UpdatePolicy;
use crate::trace_map::TraceMap;
use core::fmt;
use core::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Replays the lesson: create a map, exercise the three update policies,
/// read and delete, walk (then walk while deleting), and take one key twice.
pub const WALKTHROUGH: &str = "\
create-map 100 4 4 no-prealloc
put 1 1234 any
put 1 5678 noexist
put 1234 5678 exist
get 1
del 1
put 1 1235 noexist
put 2 1236 noexist
put 3 1237 noexist
put 4 1238 noexist
iterate
iterate-delete 2
take 1
take 1
";

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("no map created yet; run create-map first")]
    NoMap,

    #[error(transparent)]
    Map(#[from] MapError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    CreateMap(MapConfig),
    Map(MapOp),
}

/// Commands that act on the current map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapOp {
    Put {
        key: i64,
        value: i64,
        policy: UpdatePolicy,
    },
    Get(i64),
    Del(i64),
    Take(i64),
    Incr {
        key: i64,
        delta: i64,
    },
    Iterate,
    /// Walk the map, deleting the given key right after it is yielded.
    IterateDelete(i64),
    Len,
}

fn parse_int(word: &str) -> Result<i64, CommandError> {
    let parsed = match word.strip_prefix("0x").or_else(|| word.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).map(|n| n as i64),
        None => word.parse::<i64>(),
    };
    parsed.map_err(|_| CommandError::Parse(format!("not an integer: {word}")))
}

fn parse_usize(word: &str) -> Result<usize, CommandError> {
    word.parse()
        .map_err(|_| CommandError::Parse(format!("not a size: {word}")))
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let arity = |n: usize| -> Result<(), CommandError> {
            if words.len() == n + 1 {
                Ok(())
            } else {
                Err(CommandError::Parse(format!(
                    "{} takes {n} argument(s)",
                    words[0]
                )))
            }
        };
        let Some(&verb) = words.first() else {
            return Err(CommandError::Parse("empty command".to_string()));
        };
        if verb == "create-map" {
            if words.len() < 4 {
                return Err(CommandError::Parse(
                    "create-map takes <capacity> <key_size> <value_size>".to_string(),
                ));
            }
            let mut config = MapConfig::new(
                parse_usize(words[1])?,
                parse_usize(words[2])?,
                parse_usize(words[3])?,
            );
            for flag in &words[4..] {
                config = match *flag {
                    "no-prealloc" => config.with_preallocate(false),
                    "no-take" => config.with_lookup_and_delete(false),
                    other => return Err(CommandError::Parse(format!("unknown map flag: {other}"))),
                };
            }
            return Ok(Command::CreateMap(config));
        }
        let op = match verb {
            "put" => {
                let policy = match words.len() {
                    3 => UpdatePolicy::default(),
                    4 => words[3]
                        .parse::<UpdatePolicy>()
                        .map_err(CommandError::Parse)?,
                    _ => {
                        return Err(CommandError::Parse(
                            "put takes <key> <value> [policy]".to_string(),
                        ))
                    }
                };
                Ok(MapOp::Put {
                    key: parse_int(words[1])?,
                    value: parse_int(words[2])?,
                    policy,
                })
            }
            "get" => arity(1).and_then(|()| Ok(MapOp::Get(parse_int(words[1])?))),
            "del" => arity(1).and_then(|()| Ok(MapOp::Del(parse_int(words[1])?))),
            "take" => arity(1).and_then(|()| Ok(MapOp::Take(parse_int(words[1])?))),
            "incr" => arity(2).and_then(|()| {
                Ok(MapOp::Incr {
                    key: parse_int(words[1])?,
                    delta: parse_int(words[2])?,
                })
            }),
            "iterate" => arity(0).map(|()| MapOp::Iterate),
            "iterate-delete" => {
                arity(1).and_then(|()| Ok(MapOp::IterateDelete(parse_int(words[1])?)))
            }
            "len" => arity(0).map(|()| MapOp::Len),
            other => Err(CommandError::Parse(format!("unknown command: {other}"))),
        }?;
        Ok(Command::Map(op))
    }
}

/// One observation made during a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEvent {
    Key(i64),
    Deleted(i64),
    Restarted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created(MapConfig),
    Updated,
    Value(i64),
    Deleted,
    Taken(i64),
    Incremented(i64),
    Walk(Vec<WalkEvent>),
    Len(usize),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Created(c) => write!(
                f,
                "map created: capacity {} key_size {} value_size {}",
                c.capacity, c.key_size, c.value_size
            ),
            Outcome::Updated => f.write_str("map updated with new element"),
            Outcome::Value(v) => write!(f, "value read from the map: '{v}'"),
            Outcome::Deleted => f.write_str("element deleted from map"),
            Outcome::Taken(v) => write!(f, "value from the map: '{v}'"),
            Outcome::Incremented(v) => write!(f, "counter is now: '{v}'"),
            Outcome::Walk(events) if events.is_empty() => f.write_str("the map is empty"),
            Outcome::Walk(events) => {
                for (i, event) in events.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n")?;
                    }
                    match event {
                        WalkEvent::Key(k) => write!(f, "the next key in the map is: '{k}'")?,
                        WalkEvent::Deleted(k) => write!(f, "deleting key {k}")?,
                        WalkEvent::Restarted => f.write_str("walk restarted from the first key")?,
                    }
                }
                Ok(())
            }
            Outcome::Len(n) => write!(f, "{n} entries"),
        }
    }
}

/// Holds the map commands act on. `create-map` replaces it.
#[derive(Debug, Default)]
pub struct Session {
    map: Option<Arc<TraceMap>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_map(map: Arc<TraceMap>) -> Self {
        Self { map: Some(map) }
    }

    pub fn map(&self) -> Option<&Arc<TraceMap>> {
        self.map.as_ref()
    }

    fn current(&self) -> Result<&TraceMap, CommandError> {
        self.map.as_deref().ok_or(CommandError::NoMap)
    }

    fn create(&mut self, config: MapConfig) -> Result<Outcome, CommandError> {
        let map = TraceMap::new(config.clone())?;
        info!(
            capacity = config.capacity,
            key_size = config.key_size,
            value_size = config.value_size,
            "map created"
        );
        self.map = Some(Arc::new(map));
        Ok(Outcome::Created(config))
    }

    pub fn execute(&mut self, command: Command) -> Result<Outcome, CommandError> {
        match command {
            Command::CreateMap(config) => self.create(config),
            Command::Map(op) => self.apply(op),
        }
    }

    fn apply(&self, op: MapOp) -> Result<Outcome, CommandError> {
        let map = self.current()?;
        let key = |n: i64| counter::encode(n, map.key_size());
        match op {
            MapOp::Put { key: k, value, policy } => {
                map.update(&key(k), &counter::encode(value, map.value_size()), policy)?;
                Ok(Outcome::Updated)
            }
            MapOp::Get(k) => match map.lookup(&key(k))? {
                Some(v) => Ok(Outcome::Value(counter::decode(&v))),
                None => Err(MapError::NotFound.into()),
            },
            MapOp::Del(k) => {
                map.delete(&key(k))?;
                Ok(Outcome::Deleted)
            }
            MapOp::Take(k) => {
                let v = map.lookup_and_delete(&key(k))?;
                Ok(Outcome::Taken(counter::decode(&v)))
            }
            MapOp::Incr { key: k, delta } => {
                let k = key(k);
                map.increment_locked(&k, delta)?;
                let now = map.lookup(&k)?.map(|v| counter::decode(&v)).unwrap_or(0);
                Ok(Outcome::Incremented(now))
            }
            MapOp::Iterate => Ok(Outcome::Walk(
                map.keys()
                    .map(|k| WalkEvent::Key(counter::decode(&k)))
                    .collect(),
            )),
            MapOp::IterateDelete(target) => {
                let mut events = Vec::new();
                let mut keys = map.keys();
                let mut restarts = 0;
                while let Some(k) = keys.next() {
                    if keys.restarts() > restarts {
                        restarts = keys.restarts();
                        events.push(WalkEvent::Restarted);
                    }
                    let n = counter::decode(&k);
                    events.push(WalkEvent::Key(n));
                    if n == target {
                        map.delete(&k)?;
                        events.push(WalkEvent::Deleted(n));
                    }
                }
                Ok(Outcome::Walk(events))
            }
            MapOp::Len => Ok(Outcome::Len(map.len())),
        }
    }

    /// Parse and run one line. Blank lines and `#` comments yield `None`.
    pub fn run_line(&mut self, line: &str) -> Option<Result<Outcome, CommandError>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        Some(line.parse().and_then(|cmd| self.execute(cmd)))
    }

    /// Run every line of `script`, pairing each command with its result.
    pub fn run_script(&mut self, script: &str) -> Vec<(String, Result<Outcome, CommandError>)> {
        script
            .lines()
            .filter_map(|line| self.run_line(line).map(|res| (line.trim().to_string(), res)))
            .collect()
    }
}
