//! Flat-file mirror of the flag ledger.
//!
//! UTF-8 text, one `guild:user:amount` record per line, no escaping. The
//! file is always rewritten whole from the union of all loaded guilds; it
//! is a write-through cache of the ledger, not an append log. Malformed
//! lines are skipped and parsing continues.

use sentinel_proto::{GuildId, UserId};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use tracing::warn;

/// Parse counter lines in either scoped (`user:amount`) or global
/// (`guild:user:amount`) form. Three-field lines are filtered to `scope`
/// when one is given.
pub fn parse_flag_lines<'a>(
    lines: impl IntoIterator<Item = &'a str>,
    scope: Option<GuildId>,
) -> BTreeMap<UserId, u32> {
    let mut out = BTreeMap::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split(':').collect();
        match parts.as_slice() {
            [user, amount] => {
                let (Ok(user), Ok(amount)) = (user.trim().parse(), amount.trim().parse()) else {
                    continue;
                };
                out.insert(UserId(user), amount);
            }
            [guild, user, amount] => {
                let (Ok(guild), Ok(user), Ok(amount)) = (
                    guild.trim().parse(),
                    user.trim().parse(),
                    amount.trim().parse(),
                ) else {
                    continue;
                };
                if scope.is_none_or(|s| s == GuildId(guild)) {
                    out.entry(UserId(user)).or_insert(amount);
                }
            }
            _ => continue,
        }
    }
    out
}

/// Read the whole mirror, grouped by guild. A missing file is empty.
pub fn load_global(path: &Path) -> BTreeMap<GuildId, BTreeMap<UserId, u32>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(err) => {
            warn!(error = %err, path = %path.display(), "failed to read flags file");
            return BTreeMap::new();
        }
    };

    let mut out: BTreeMap<GuildId, BTreeMap<UserId, u32>> = BTreeMap::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split(':').collect();
        let [guild, user, amount] = parts.as_slice() else {
            continue;
        };
        let (Ok(guild), Ok(user), Ok(amount)) = (
            guild.trim().parse::<u64>(),
            user.trim().parse::<u64>(),
            amount.trim().parse::<u32>(),
        ) else {
            continue;
        };
        out.entry(GuildId(guild))
            .or_default()
            .insert(UserId(user), amount);
    }
    out
}

/// Rewrite the mirror from a full-ledger snapshot.
pub fn write_global(path: &Path, snapshot: &[(GuildId, UserId, u32)]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut body = String::new();
    for (guild, user, amount) in snapshot {
        body.push_str(&format!("{guild}:{user}:{amount}\n"));
    }
    std::fs::write(path, body)
}

/// Render one guild's counters as a pin body (`user:amount` lines).
pub fn render_pin_body(entries: &[(UserId, u32)]) -> String {
    let mut body = String::new();
    for (user, amount) in entries {
        body.push_str(&format!("{user}:{amount}\n"));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scoped_lines() {
        let parsed = parse_flag_lines(["100:3", "200:5"], Some(GuildId(1)));
        assert_eq!(parsed.get(&UserId(100)), Some(&3));
        assert_eq!(parsed.get(&UserId(200)), Some(&5));
    }

    #[test]
    fn global_lines_are_filtered_to_scope() {
        let parsed = parse_flag_lines(["1:100:3", "2:200:5"], Some(GuildId(1)));
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.get(&UserId(100)), Some(&3));
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let parsed = parse_flag_lines(
            ["", "garbage", "1:2:3:4", "x:y", "100:7", "100:not-a-number"],
            None,
        );
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.get(&UserId(100)), Some(&7));
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flags.dat");
        let snapshot = vec![
            (GuildId(1), UserId(100), 3),
            (GuildId(1), UserId(200), 1),
            (GuildId(2), UserId(100), 9),
        ];
        write_global(&path, &snapshot).unwrap();

        let loaded = load_global(&path);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[&GuildId(1)][&UserId(100)], 3);
        assert_eq!(loaded[&GuildId(1)][&UserId(200)], 1);
        assert_eq!(loaded[&GuildId(2)][&UserId(100)], 9);
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_global(&dir.path().join("absent.dat")).is_empty());
    }

    #[test]
    fn pin_body_round_trips_through_parser() {
        let entries = vec![(UserId(100), 3), (UserId(200), 0)];
        let body = render_pin_body(&entries);
        let parsed = parse_flag_lines(body.lines(), Some(GuildId(1)));
        assert_eq!(
            parsed.into_iter().collect::<Vec<_>>(),
            vec![(UserId(100), 3), (UserId(200), 0)]
        );
    }
}
