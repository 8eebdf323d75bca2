//! The command table and typed command representation.
//!
//! The table drives the dispatch path: name lookup, arity checking, and
//! the bulk-payload flag all happen against [`CommandSpec`] rows before
//! any per-command parsing. Once a complete argv is assembled,
//! [`Command::build`] converts it into a typed [`Command`], which keeps
//! wire-level concerns out of the store that executes commands.

use bytes::Bytes;

/// A row in the command table.
///
/// `arity` counts the command name itself. A positive arity must match
/// exactly; a negative arity means "at least that many". `bulk` marks
/// commands whose final argument arrives as a length-prefixed payload
/// after the command line.
#[derive(Debug)]
pub struct CommandSpec {
    pub name: &'static str,
    pub arity: i32,
    pub bulk: bool,
}

const fn spec(name: &'static str, arity: i32, bulk: bool) -> CommandSpec {
    CommandSpec { name, arity, bulk }
}

/// Every command the server understands.
static COMMANDS: &[CommandSpec] = &[
    spec("get", 2, false),
    spec("set", 3, true),
    spec("setnx", 3, true),
    spec("del", 2, false),
    spec("exists", 2, false),
    spec("incr", 2, false),
    spec("decr", 2, false),
    spec("rpush", 3, true),
    spec("lpush", 3, true),
    spec("rpop", 2, false),
    spec("lpop", 2, false),
    spec("llen", 2, false),
    spec("lindex", 3, false),
    spec("lset", 4, true),
    spec("lrange", 4, false),
    spec("ltrim", 4, false),
    spec("sadd", 3, true),
    spec("srem", 3, true),
    spec("sismember", 3, true),
    spec("scard", 2, false),
    spec("sinter", -2, false),
    spec("smembers", 2, false),
    spec("incrby", 3, false),
    spec("decrby", 3, false),
    spec("randomkey", 1, false),
    spec("select", 2, false),
    spec("move", 3, false),
    spec("rename", 3, false),
    spec("renamenx", 3, false),
    spec("keys", 2, false),
    spec("dbsize", 1, false),
    spec("ping", 1, false),
    spec("echo", 2, true),
    spec("save", 1, false),
    spec("bgsave", 1, false),
    spec("shutdown", 1, false),
    spec("lastsave", 1, false),
    spec("type", 2, false),
];

/// Looks up a command by its lowercased name.
pub fn lookup(name: &[u8]) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|c| c.name.as_bytes() == name)
}

/// A parsed client command, ready for execution.
///
/// Several wire commands collapse into one variant: `INCR`, `DECR`,
/// `INCRBY` and `DECRBY` all become [`Command::IncrBy`]; `SETNX` is
/// [`Command::Set`] with `nx`; `RENAMENX` is [`Command::Rename`] with
/// `nx`; `SMEMBERS` is a single-key [`Command::SInter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// PING. Replies PONG.
    Ping,
    /// ECHO <message>. Bulk-echoes the message.
    Echo { message: Bytes },
    /// SELECT <index>. Switches the connection's database.
    Select { index: i64 },
    /// DBSIZE. Key count of the selected database.
    DbSize,
    /// SAVE. Synchronous snapshot.
    Save,
    /// BGSAVE. Background snapshot; refused while one is in flight.
    BgSave,
    /// LASTSAVE. UNIX time of the last successful snapshot.
    LastSave,
    /// SHUTDOWN. Save synchronously, then exit.
    Shutdown,
    /// TYPE <key>. Textual type name of the value at key.
    Type { key: Bytes },

    /// SET / SETNX <key> <value>.
    Set { key: Bytes, value: Bytes, nx: bool },
    /// GET <key>.
    Get { key: Bytes },
    /// INCR / DECR / INCRBY / DECRBY <key> [delta].
    IncrBy { key: Bytes, delta: i64 },

    /// DEL <key>.
    Del { key: Bytes },
    /// EXISTS <key>.
    Exists { key: Bytes },
    /// RENAME / RENAMENX <src> <dst>.
    Rename { src: Bytes, dst: Bytes, nx: bool },
    /// MOVE <key> <db>.
    Move { key: Bytes, db: i64 },
    /// RANDOMKEY.
    RandomKey,
    /// KEYS <pattern>. Glob-matches against every key.
    Keys { pattern: Bytes },

    /// LPUSH / RPUSH <key> <value>.
    Push { key: Bytes, value: Bytes, head: bool },
    /// LPOP / RPOP <key>.
    Pop { key: Bytes, head: bool },
    /// LLEN <key>.
    LLen { key: Bytes },
    /// LINDEX <key> <index>. Negative indexes count from the tail.
    LIndex { key: Bytes, index: i64 },
    /// LSET <key> <index> <value>.
    LSet { key: Bytes, index: i64, value: Bytes },
    /// LRANGE <key> <start> <stop>.
    LRange { key: Bytes, start: i64, stop: i64 },
    /// LTRIM <key> <start> <stop>.
    LTrim { key: Bytes, start: i64, stop: i64 },

    /// SADD <key> <member>.
    SAdd { key: Bytes, member: Bytes },
    /// SREM <key> <member>.
    SRem { key: Bytes, member: Bytes },
    /// SISMEMBER <key> <member>.
    SIsMember { key: Bytes, member: Bytes },
    /// SCARD <key>.
    SCard { key: Bytes },
    /// SINTER <key> [key ...] (also SMEMBERS <key>).
    SInter { keys: Vec<Bytes> },

    /// QUIT. Closes the connection without a reply.
    Quit,
}

impl Command {
    /// Builds a typed command from a complete argv.
    ///
    /// `args[0]` is the command name; the arity was already validated
    /// against `spec`, so the per-command field extraction can index
    /// freely. Integer arguments use [`atoi`] semantics.
    pub fn build(spec: &CommandSpec, args: Vec<Bytes>) -> Command {
        match spec.name {
            "ping" => Command::Ping,
            "echo" => Command::Echo {
                message: args.into_iter().nth(1).unwrap_or_default(),
            },
            "select" => Command::Select {
                index: atoi(&args[1]),
            },
            "dbsize" => Command::DbSize,
            "save" => Command::Save,
            "bgsave" => Command::BgSave,
            "shutdown" => Command::Shutdown,
            "lastsave" => Command::LastSave,
            "type" => Command::Type {
                key: args[1].clone(),
            },

            "set" | "setnx" => Command::Set {
                key: args[1].clone(),
                value: args[2].clone(),
                nx: spec.name == "setnx",
            },
            "get" => Command::Get {
                key: args[1].clone(),
            },
            "incr" => Command::IncrBy {
                key: args[1].clone(),
                delta: 1,
            },
            "decr" => Command::IncrBy {
                key: args[1].clone(),
                delta: -1,
            },
            "incrby" => Command::IncrBy {
                key: args[1].clone(),
                delta: atoi(&args[2]),
            },
            "decrby" => Command::IncrBy {
                key: args[1].clone(),
                delta: atoi(&args[2]).wrapping_neg(),
            },

            "del" => Command::Del {
                key: args[1].clone(),
            },
            "exists" => Command::Exists {
                key: args[1].clone(),
            },
            "rename" | "renamenx" => Command::Rename {
                src: args[1].clone(),
                dst: args[2].clone(),
                nx: spec.name == "renamenx",
            },
            "move" => Command::Move {
                key: args[1].clone(),
                db: atoi(&args[2]),
            },
            "randomkey" => Command::RandomKey,
            "keys" => Command::Keys {
                pattern: args[1].clone(),
            },

            "lpush" | "rpush" => Command::Push {
                key: args[1].clone(),
                value: args[2].clone(),
                head: spec.name == "lpush",
            },
            "lpop" | "rpop" => Command::Pop {
                key: args[1].clone(),
                head: spec.name == "lpop",
            },
            "llen" => Command::LLen {
                key: args[1].clone(),
            },
            "lindex" => Command::LIndex {
                key: args[1].clone(),
                index: atoi(&args[2]),
            },
            "lset" => Command::LSet {
                key: args[1].clone(),
                index: atoi(&args[2]),
                value: args[3].clone(),
            },
            "lrange" => Command::LRange {
                key: args[1].clone(),
                start: atoi(&args[2]),
                stop: atoi(&args[3]),
            },
            "ltrim" => Command::LTrim {
                key: args[1].clone(),
                start: atoi(&args[2]),
                stop: atoi(&args[3]),
            },

            "sadd" => Command::SAdd {
                key: args[1].clone(),
                member: args[2].clone(),
            },
            "srem" => Command::SRem {
                key: args[1].clone(),
                member: args[2].clone(),
            },
            "sismember" => Command::SIsMember {
                key: args[1].clone(),
                member: args[2].clone(),
            },
            "scard" => Command::SCard {
                key: args[1].clone(),
            },
            "sinter" | "smembers" => Command::SInter {
                keys: args[1..].to_vec(),
            },

            // the table is the exhaustive list of names; a row without a
            // build arm is a bug caught by the table test below
            other => unreachable!("command '{other}' in table but not in build"),
        }
    }
}

/// C `atoi`-style integer parsing: optional sign, then leading digits;
/// parsing stops at the first non-digit and saturates on overflow.
/// Anything unparseable is 0, matching how the wire protocol treats
/// malformed numeric arguments.
pub fn atoi(bytes: &[u8]) -> i64 {
    let mut rest = bytes;
    let mut negative = false;
    match rest.first() {
        Some(b'-') => {
            negative = true;
            rest = &rest[1..];
        }
        Some(b'+') => rest = &rest[1..],
        _ => {}
    }

    let mut value: i64 = 0;
    for &b in rest {
        if !b.is_ascii_digit() {
            break;
        }
        value = value
            .saturating_mul(10)
            .saturating_add(i64::from(b - b'0'));
    }
    if negative {
        value.wrapping_neg()
    } else {
        value
    }
}
