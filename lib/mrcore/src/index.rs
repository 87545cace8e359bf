//! String-keyed separate-chaining hash table.
//!
//! Used by the grouping stage to map a key to its key-slot. The table keeps
//! the bucket count a power of two and doubles it whenever the number of
//! entries reaches the number of buckets (load factor 1.0).

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// 32-bit FNV-1a over the key bytes.
pub fn fnv1a(key: &str) -> u32 {
    key.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

#[derive(Debug, Clone)]
struct Node<V> {
    hash: u32,
    key: Box<str>,
    value: V,
}

#[derive(Debug, Clone)]
pub struct IntermediateIndex<V> {
    buckets: Vec<Vec<Node<V>>>,
    len: usize,
}

impl<V> Default for IntermediateIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> IntermediateIndex<V> {
    pub fn new() -> Self {
        Self { buckets: Vec::new(), len: 0 }
    }

    /// Pre-sizes the bucket array so `entries` inserts never trigger a resize.
    pub fn with_capacity(entries: usize) -> Self {
        let mut index = Self::new();
        if entries > 0 {
            index.resize(entries.next_power_of_two());
        }
        index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current bucket count.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Inserts `value` under `key`, returning the previous value if the key
    /// was already present.
    pub fn insert(&mut self, key: &str, value: V) -> Option<V> {
        let hash = fnv1a(key);
        if let Some(node) = self.find_mut(hash, key) {
            return Some(std::mem::replace(&mut node.value, value));
        }
        if self.len >= self.buckets.len() {
            let doubled = (self.buckets.len() << 1).max(1);
            self.resize(doubled);
        }
        let bucket = self.bucket_of(hash);
        self.buckets[bucket].push(Node { hash, key: key.into(), value });
        self.len += 1;
        None
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        if self.buckets.is_empty() {
            return None;
        }
        let hash = fnv1a(key);
        self.buckets[self.bucket_of(hash)]
            .iter()
            .find(|node| node.hash == hash && *node.key == *key)
            .map(|node| &node.value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        let hash = fnv1a(key);
        self.find_mut(hash, key).map(|node| &mut node.value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        if self.buckets.is_empty() {
            return None;
        }
        let hash = fnv1a(key);
        let bucket = self.bucket_of(hash);
        let chain = &mut self.buckets[bucket];
        let pos = chain
            .iter()
            .position(|node| node.hash == hash && *node.key == *key)?;
        self.len -= 1;
        Some(chain.swap_remove(pos).value)
    }

    /// Every key exactly once, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.iter().map(|(key, _)| key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> + '_ {
        self.buckets
            .iter()
            .flat_map(|chain| chain.iter().map(|node| (&*node.key, &node.value)))
    }

    fn bucket_of(&self, hash: u32) -> usize {
        hash as usize & (self.buckets.len() - 1)
    }

    fn find_mut(&mut self, hash: u32, key: &str) -> Option<&mut Node<V>> {
        if self.buckets.is_empty() {
            return None;
        }
        let bucket = self.bucket_of(hash);
        self.buckets[bucket]
            .iter_mut()
            .find(|node| node.hash == hash && *node.key == *key)
    }

    fn resize(&mut self, buckets: usize) {
        let mut resized: Vec<Vec<Node<V>>> = (0..buckets).map(|_| Vec::new()).collect();
        for node in self.buckets.drain(..).flatten() {
            resized[node.hash as usize & (buckets - 1)].push(node);
        }
        self.buckets = resized;
    }
}
