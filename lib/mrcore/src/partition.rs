//! Built-in partitioners. A partitioner is a pure function of the key and the
//! partition count returning an index in `[0, num_partitions)`.

pub trait Partitioner: Sync {
    fn partition(&self, key: &str, num_partitions: usize) -> usize;
}

impl<F> Partitioner for F
where
    F: Fn(&str, usize) -> usize + Sync,
{
    fn partition(&self, key: &str, num_partitions: usize) -> usize {
        self(key, num_partitions)
    }
}

/// Polynomial base-33 string hash (`h = h * 33 + byte`, seeded with 5381)
/// reduced modulo the partition count.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashPartitioner;

impl Partitioner for HashPartitioner {
    fn partition(&self, key: &str, num_partitions: usize) -> usize {
        default_hash_partition(key, num_partitions)
    }
}

/// Range partitioner for keys that are unsigned integers in `[0, 2^32)`.
/// Keeps key order across partitions: smaller numbers never land in a higher
/// partition than larger ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct SortedPartitioner;

impl Partitioner for SortedPartitioner {
    fn partition(&self, key: &str, num_partitions: usize) -> usize {
        sorted_partition(key, num_partitions)
    }
}

pub fn default_hash_partition(key: &str, num_partitions: usize) -> usize {
    debug_assert!(num_partitions > 0);
    let hash = key
        .bytes()
        .fold(5381u64, |hash, byte| hash.wrapping_mul(33).wrapping_add(u64::from(byte)));
    (hash % num_partitions as u64) as usize
}

/// Scales the numeric value of `key` into `num_partitions` buckets with a
/// 32-bit fixed-point shift. Values above `u32::MAX` (including negative
/// inputs, which wrap) saturate into the last partition.
pub fn sorted_partition(key: &str, num_partitions: usize) -> usize {
    debug_assert!(num_partitions > 0);
    let value = u128::from(parse_unsigned(key).min(u64::from(u32::MAX)));
    ((value * num_partitions as u128) >> 32) as usize
}

/// Parses the leading unsigned integer of `key` with C `strtoul(_, _, 0)`
/// rules: optional whitespace and sign, `0x` for hex, leading `0` for octal.
/// Returns 0 when no digits are found and `u64::MAX` on overflow.
pub fn parse_unsigned(key: &str) -> u64 {
    let rest = key.trim_start_matches(|c: char| c.is_ascii_whitespace() || c == '\x0b');
    let (negative, rest) = match rest.as_bytes().first() {
        Some(b'-') => (true, &rest[1..]),
        Some(b'+') => (false, &rest[1..]),
        _ => (false, rest),
    };

    let bytes = rest.as_bytes();
    let (radix, digits) = match bytes {
        [b'0', b'x' | b'X', next, ..] if next.is_ascii_hexdigit() => (16, &rest[2..]),
        [b'0', ..] => (8, rest),
        _ => (10, rest),
    };

    let mut value: u64 = 0;
    let mut overflow = false;
    for c in digits.chars() {
        let Some(digit) = c.to_digit(radix) else { break };
        match value.checked_mul(u64::from(radix)).and_then(|v| v.checked_add(u64::from(digit))) {
            Some(next) => value = next,
            None => overflow = true,
        }
    }

    if overflow {
        u64::MAX
    } else if negative {
        value.wrapping_neg()
    } else {
        value
    }
}
