//! Per-NPC threat bookkeeping.
//!
//! Entries are kept in engagement order, so the attacker list and the set of
//! threat keys can never disagree, and ties on threat resolve to whoever
//! engaged first.

#[derive(Debug, Clone, PartialEq, Eq)]
struct ThreatEntry {
    attacker: String,
    threat: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ThreatTable {
    entries: Vec<ThreatEntry>,
}

impl ThreatTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attacker with zero threat. Returns false if already engaged.
    pub fn engage(&mut self, attacker: &str) -> bool {
        if self.contains(attacker) {
            return false;
        }
        self.entries.push(ThreatEntry {
            attacker: attacker.to_string(),
            threat: 0,
        });
        true
    }

    /// Add threat, engaging the attacker first if needed. Negative amounts are ignored.
    pub fn add(&mut self, attacker: &str, amount: i64) {
        let amount = amount.max(0);
        match self.entries.iter_mut().find(|e| e.attacker == attacker) {
            Some(entry) => entry.threat = entry.threat.saturating_add(amount),
            None => self.entries.push(ThreatEntry {
                attacker: attacker.to_string(),
                threat: amount,
            }),
        }
    }

    /// Threat recorded for an attacker; absent attackers have zero
    pub fn threat_of(&self, attacker: &str) -> i64 {
        self.entries
            .iter()
            .find(|e| e.attacker == attacker)
            .map_or(0, |e| e.threat)
    }

    /// Attacker with the greatest threat, earliest engagement winning ties
    pub fn highest(&self) -> Option<&str> {
        let mut best: Option<&ThreatEntry> = None;
        for entry in &self.entries {
            match best {
                Some(b) if b.threat >= entry.threat => {}
                _ => best = Some(entry),
            }
        }
        best.map(|e| e.attacker.as_str())
    }

    pub fn remove(&mut self, attacker: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.attacker != attacker);
        self.entries.len() != before
    }

    /// Empty the table, returning attackers in engagement order
    pub fn clear(&mut self) -> Vec<String> {
        self.entries.drain(..).map(|e| e.attacker).collect()
    }

    pub fn contains(&self, attacker: &str) -> bool {
        self.entries.iter().any(|e| e.attacker == attacker)
    }

    /// Engaged attackers in engagement order
    pub fn targets(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.attacker.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
