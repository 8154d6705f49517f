//! M2 Continuity Store - per-symbol memory nodes: creation, evidence,
//! decay, lifecycle, order-book state. Owned exclusively by `System`.
//!
//! `strength` and `confidence` never leave this module's callers' hands in
//! recognizable form - M4 reads nodes to compute primitives, but no
//! primitive record carries these fields forward.

use std::collections::HashMap;

use super::constants::*;
use super::types::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Active,
    Dormant,
    Archived,
}

/// One ACTIVE-state interval. The currently-open interval has `exit_ts = None`.
/// Backs StructuralPersistenceDuration (#16); see Open Question 3.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresenceInterval {
    pub enter_ts: f64,
    pub exit_ts: Option<f64>,
}

/// A price-level memory entity, owning cumulative evidence about that level
/// in one symbol.
#[derive(Debug, Clone)]
pub struct MemoryNode {
    pub node_id: u64,
    pub symbol: String,
    pub price_center: f64,
    pub price_band: f64,

    pub trade_execution_count: u64,
    pub total_volume: f64,
    pub liquidation_count: u64,
    pub liquidation_volume: f64,
    pub buyer_initiated_volume: f64,
    pub seller_initiated_volume: f64,

    /// Current, decayed strength - recomputed from `strength_anchor` on
    /// every decay tick. Internal only, never exposed on `Snapshot`.
    pub(crate) strength: f64,
    /// Strength immediately after the most recent evidence application,
    /// i.e. before any decay since `last_interaction_ts`. Recomputing
    /// `strength` from this anchor on every tick (rather than repeatedly
    /// multiplying `strength` in place) is what makes decay idempotent
    /// under repeated `advance_time` calls at the same timestamp.
    pub(crate) strength_anchor: f64,
    pub(crate) confidence: f64,

    pub state: NodeState,
    pub created_ts: f64,
    pub last_interaction_ts: f64,

    pub resting_size_bid: f64,
    pub resting_size_ask: f64,
    pub previous_resting_size_bid: f64,
    pub previous_resting_size_ask: f64,
    pub last_orderbook_update_ts: f64,
    pub previous_orderbook_update_ts: f64,
    /// `true` once a real depth update has touched this node. `new()`
    /// seeds `last_orderbook_update_ts` with the node's creation time (not
    /// a sentinel), so selecting "the most-recently-updated OB node" must
    /// filter on this flag rather than trusting that timestamp alone -
    /// otherwise a node created after another node's real OB update would
    /// wrongly look more recently updated.
    pub has_orderbook_activity: bool,
    /// Trades observed since the last order-book update touched this node.
    /// Feeds AbsorptionEvent's `trade_count` (#11).
    pub(crate) trade_count_since_last_ob_update: u64,

    pub presence_log: Vec<PresenceInterval>,
}

fn decay_rate(state: NodeState) -> f64 {
    match state {
        NodeState::Active => ACTIVE_DECAY_RATE,
        NodeState::Dormant => DORMANT_DECAY_RATE,
        NodeState::Archived => ARCHIVED_DECAY_RATE,
    }
}

impl MemoryNode {
    fn new(node_id: u64, symbol: String, price_center: f64, band: f64, ts: f64) -> Self {
        Self {
            node_id,
            symbol,
            price_center,
            price_band: band,
            trade_execution_count: 0,
            total_volume: 0.0,
            liquidation_count: 0,
            liquidation_volume: 0.0,
            buyer_initiated_volume: 0.0,
            seller_initiated_volume: 0.0,
            strength: 0.0,
            strength_anchor: 0.0,
            confidence: 0.0,
            state: NodeState::Active,
            created_ts: ts,
            last_interaction_ts: ts,
            resting_size_bid: 0.0,
            resting_size_ask: 0.0,
            previous_resting_size_bid: 0.0,
            previous_resting_size_ask: 0.0,
            last_orderbook_update_ts: ts,
            previous_orderbook_update_ts: ts,
            has_orderbook_activity: false,
            trade_count_since_last_ob_update: 0,
            presence_log: vec![PresenceInterval {
                enter_ts: ts,
                exit_ts: None,
            }],
        }
    }

    #[inline]
    pub fn overlaps(&self, price: f64) -> bool {
        (price - self.price_center).abs() <= self.price_band
    }

    pub fn strength(&self) -> f64 {
        self.strength
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Strength as of `now`, decayed from the anchor. Does not mutate.
    fn decayed_strength_at(&self, now: f64) -> f64 {
        let dt = (now - self.last_interaction_ts).max(0.0);
        let factor = (1.0 - decay_rate(self.state) * dt).max(0.0);
        (self.strength_anchor * factor).clamp(0.0, 1.0)
    }

    /// Apply an additive evidence delta at time `ts`. `is_revisit` adds the
    /// generic +0.1 revisit bonus on top of the source-specific delta; it is
    /// false only for the liquidation that creates the node.
    fn apply_evidence(&mut self, ts: f64, delta_strength: f64, delta_confidence: f64, is_revisit: bool) {
        let pre = self.decayed_strength_at(ts);
        let mut new_anchor = pre + delta_strength;
        if is_revisit {
            new_anchor += EVIDENCE_REVISIT_BONUS;
        }
        self.strength_anchor = new_anchor.clamp(0.0, 1.0);
        self.confidence = (self.confidence + delta_confidence).clamp(0.0, 1.0);
        self.last_interaction_ts = ts;
        self.strength = self.strength_anchor;
    }

    fn apply_revival_bonus(&mut self, ts: f64) {
        let pre = self.decayed_strength_at(ts);
        self.strength_anchor = (pre + EVIDENCE_REVIVAL_BONUS).clamp(0.0, 1.0);
        self.last_interaction_ts = ts;
        self.strength = self.strength_anchor;
    }

    /// Recompute displayed `strength` from the anchor and run lifecycle
    /// transitions. Pure function of (anchor, last_interaction_ts, now) -
    /// calling this repeatedly with the same `now` is a no-op after the
    /// first call.
    fn decay_and_transition(&mut self, now: f64) {
        self.strength = self.decayed_strength_at(now);
        let idle = (now - self.last_interaction_ts).max(0.0);

        match self.state {
            NodeState::Active => {
                if self.strength < ACTIVE_TO_DORMANT_STRENGTH || idle > ACTIVE_TO_DORMANT_IDLE_SECS
                {
                    self.transition_to(NodeState::Dormant, now);
                }
            }
            NodeState::Dormant => {
                if self.strength < DORMANT_TO_ARCHIVED_STRENGTH
                    || idle > DORMANT_TO_ARCHIVED_IDLE_SECS
                {
                    self.transition_to(NodeState::Archived, now);
                }
            }
            NodeState::Archived => {}
        }
    }

    fn transition_to(&mut self, new_state: NodeState, now: f64) {
        if self.state == NodeState::Active && new_state != NodeState::Active {
            if let Some(last) = self.presence_log.last_mut() {
                if last.exit_ts.is_none() {
                    last.exit_ts = Some(now);
                }
            }
        }
        if new_state == NodeState::Active && self.state != NodeState::Active {
            self.presence_log.push(PresenceInterval {
                enter_ts: now,
                exit_ts: None,
            });
        }
        self.state = new_state;
    }

    fn revive(&mut self, now: f64) {
        self.transition_to(NodeState::Active, now);
        self.apply_revival_bonus(now);
    }
}

/// Per-symbol memory, owned by `System`.
#[derive(Debug, Default)]
pub struct ContinuityStore {
    nodes: HashMap<String, Vec<MemoryNode>>,
    next_node_id: u64,
}

impl ContinuityStore {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            next_node_id: 1,
        }
    }

    fn symbol_nodes_mut(&mut self, symbol: &str) -> &mut Vec<MemoryNode> {
        self.nodes.entry(symbol.to_string()).or_default()
    }

    pub fn nodes(&self, symbol: &str) -> &[MemoryNode] {
        self.nodes.get(symbol).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn active_nodes(&self, symbol: &str) -> Vec<&MemoryNode> {
        self.nodes(symbol)
            .iter()
            .filter(|n| n.state == NodeState::Active)
            .collect()
    }

    /// Nearest node (any state) to `price` in `symbol`, by center distance.
    pub fn nearest_to_price(&self, symbol: &str, price: f64) -> Option<&MemoryNode> {
        self.nodes(symbol)
            .iter()
            .min_by(|a, b| {
                (a.price_center - price)
                    .abs()
                    .partial_cmp(&(b.price_center - price).abs())
                    .unwrap()
            })
    }

    /// Nearest ACTIVE node to `price`.
    pub fn nearest_active_to_price(&self, symbol: &str, price: f64) -> Option<&MemoryNode> {
        self.active_nodes(symbol)
            .into_iter()
            .min_by(|a, b| {
                (a.price_center - price)
                    .abs()
                    .partial_cmp(&(b.price_center - price).abs())
                    .unwrap()
            })
    }

    fn overlap_index(nodes: &[MemoryNode], price: f64, state: NodeState) -> Option<usize> {
        nodes
            .iter()
            .position(|n| n.state == state && n.overlaps(price))
    }

    /// Nearest node in `state` whose band would overlap a band of
    /// half-width `new_band` centered at `new_center` - i.e.
    /// `|new_center - center| <= new_band + band`, not merely
    /// price-in-band containment.
    fn band_overlap_index(
        nodes: &[MemoryNode],
        new_center: f64,
        new_band: f64,
        state: NodeState,
    ) -> Option<usize> {
        nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| {
                n.state == state && (n.price_center - new_center).abs() <= n.price_band + new_band
            })
            .min_by(|(_, a), (_, b)| {
                (a.price_center - new_center)
                    .abs()
                    .partial_cmp(&(b.price_center - new_center).abs())
                    .unwrap()
            })
            .map(|(i, _)| i)
    }

    /// Liquidation is the spark: reinforce an overlapping ACTIVE node,
    /// revive an overlapping DORMANT/ARCHIVED node, or create a new one.
    pub fn on_liquidation(
        &mut self,
        symbol: &str,
        ts: f64,
        price: f64,
        quantity: f64,
        side: Side,
        band: f64,
    ) {
        let nodes = self.symbol_nodes_mut(symbol);

        if let Some(i) = Self::overlap_index(nodes, price, NodeState::Active) {
            Self::reinforce_with_liquidation(&mut nodes[i], ts, quantity, side);
            return;
        }

        if let Some(i) = Self::overlap_index(nodes, price, NodeState::Dormant) {
            nodes[i].revive(ts);
            Self::reinforce_with_liquidation(&mut nodes[i], ts, quantity, side);
            return;
        }
        if let Some(i) = Self::overlap_index(nodes, price, NodeState::Archived) {
            nodes[i].revive(ts);
            Self::reinforce_with_liquidation(&mut nodes[i], ts, quantity, side);
            return;
        }

        // The liquidation's price falls outside every existing node's band,
        // but a node newly created here (centered at `price`, half-width
        // `band`) might still spatially overlap an ACTIVE node's band even
        // though its *center* does not fall inside that band. Distinct
        // ACTIVE nodes must never overlap, so reinforce the nearest such
        // node instead of creating a new, overlapping one.
        if let Some(i) = Self::band_overlap_index(nodes, price, band, NodeState::Active) {
            Self::reinforce_with_liquidation(&mut nodes[i], ts, quantity, side);
            return;
        }

        let node_id = self.next_node_id;
        self.next_node_id += 1;
        let mut node = MemoryNode::new(node_id, symbol.to_string(), price, band, ts);
        debug_assert!(
            self.nodes
                .get(symbol)
                .map(|ns| ns.iter().all(|n| {
                    n.state != NodeState::Active
                        || (n.price_center - price).abs() > n.price_band + band
                }))
                .unwrap_or(true),
            "new node's band must not overlap an existing ACTIVE node's band"
        );
        // First evidence application on a brand-new node is not a "revisit".
        Self::apply_liquidation_evidence(&mut node, ts, quantity, side, false);
        self.symbol_nodes_mut(symbol).push(node);
    }

    fn reinforce_with_liquidation(node: &mut MemoryNode, ts: f64, quantity: f64, side: Side) {
        Self::apply_liquidation_evidence(node, ts, quantity, side, true);
    }

    fn apply_liquidation_evidence(
        node: &mut MemoryNode,
        ts: f64,
        quantity: f64,
        side: Side,
        is_revisit: bool,
    ) {
        node.liquidation_count += 1;
        node.liquidation_volume += quantity;
        match side {
            Side::Buy => node.buyer_initiated_volume += quantity,
            Side::Sell => node.seller_initiated_volume += quantity,
        }
        let n = node.liquidation_count as f64;
        let delta_strength = EVIDENCE_LIQUIDATION_BASE + EVIDENCE_LIQUIDATION_PER_COUNT * n;
        node.apply_evidence(ts, delta_strength, EVIDENCE_LIQUIDATION_CONFIDENCE, is_revisit);
    }

    /// A trade updates every node (any state) whose band contains its price.
    pub fn on_trade(&mut self, symbol: &str, ts: f64, price: f64, quantity: f64, side: Side) {
        let nodes = self.symbol_nodes_mut(symbol);
        for node in nodes.iter_mut().filter(|n| n.overlaps(price)) {
            node.trade_execution_count += 1;
            node.total_volume += quantity;
            node.trade_count_since_last_ob_update += 1;
            match side {
                Side::Buy => node.buyer_initiated_volume += quantity,
                Side::Sell => node.seller_initiated_volume += quantity,
            }
            let delta_strength = EVIDENCE_VOLUME_BASE + EVIDENCE_VOLUME_PER_1000 * (quantity / 1000.0);
            node.apply_evidence(ts, delta_strength, EVIDENCE_VOLUME_CONFIDENCE, true);
        }
    }

    /// A depth level updates every node (any state) whose band contains it.
    pub fn on_depth_level(&mut self, symbol: &str, ts: f64, price: f64, size: f64, is_bid: bool) {
        let nodes = self.symbol_nodes_mut(symbol);
        for node in nodes.iter_mut().filter(|n| n.overlaps(price)) {
            let duration = (node.last_orderbook_update_ts - node.previous_orderbook_update_ts).max(0.0);
            if is_bid {
                node.previous_resting_size_bid = node.resting_size_bid;
                node.resting_size_bid = size;
            } else {
                node.previous_resting_size_ask = node.resting_size_ask;
                node.resting_size_ask = size;
            }
            node.previous_orderbook_update_ts = node.last_orderbook_update_ts;
            node.last_orderbook_update_ts = ts;
            node.has_orderbook_activity = true;
            node.trade_count_since_last_ob_update = 0;

            let delta_strength = EVIDENCE_OB_BASE + EVIDENCE_OB_PER_SEC * duration;
            node.apply_evidence(ts, delta_strength, EVIDENCE_OB_CONFIDENCE, true);
        }
    }

    /// Decay and evaluate lifecycle transitions for every node in every
    /// symbol. Called on every `ingest`/`advance_time`, global `now`.
    pub fn decay_and_transition_all(&mut self, now: f64) {
        for nodes in self.nodes.values_mut() {
            for node in nodes.iter_mut() {
                node.decay_and_transition(now);
            }
        }
    }

    /// For tests/invariant checks: no two ACTIVE nodes in a symbol overlap.
    pub fn active_nodes_non_overlapping(&self, symbol: &str) -> bool {
        let active = self.active_nodes(symbol);
        for i in 0..active.len() {
            for j in (i + 1)..active.len() {
                if (active[i].price_center - active[j].price_center).abs()
                    <= active[i].price_band + active[j].price_band
                {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn liquidation_creates_active_node() {
        let mut store = ContinuityStore::new();
        store.on_liquidation("BTC", 1000.0, 50000.0, 100.0, Side::Buy, 5.0);
        let nodes = store.nodes("BTC");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].state, NodeState::Active);
        assert_eq!(nodes[0].liquidation_count, 1);
        assert_eq!(nodes[0].price_center, 50000.0);
    }

    #[test]
    fn overlapping_liquidation_reinforces_not_creates() {
        let mut store = ContinuityStore::new();
        store.on_liquidation("BTC", 1000.0, 50000.0, 100.0, Side::Buy, 5.0);
        store.on_liquidation("BTC", 1001.0, 50001.0, 50.0, Side::Sell, 5.0);
        assert_eq!(store.nodes("BTC").len(), 1);
        assert_eq!(store.nodes("BTC")[0].liquidation_count, 2);
    }

    #[test]
    fn non_overlapping_liquidation_creates_second_node() {
        let mut store = ContinuityStore::new();
        store.on_liquidation("BTC", 1000.0, 50000.0, 100.0, Side::Buy, 5.0);
        store.on_liquidation("BTC", 1001.0, 51000.0, 50.0, Side::Sell, 5.0);
        assert_eq!(store.nodes("BTC").len(), 2);
    }

    #[test]
    fn trade_updates_overlapping_node() {
        let mut store = ContinuityStore::new();
        store.on_liquidation("BTC", 1000.0, 50000.0, 100.0, Side::Buy, 5.0);
        store.on_trade("BTC", 1001.0, 50000.0, 5.0, Side::Sell);
        let node = &store.nodes("BTC")[0];
        assert_eq!(node.total_volume, 5.0);
        assert_eq!(node.seller_initiated_volume, 5.0);
    }

    #[test]
    fn idle_transitions_active_to_dormant() {
        let mut store = ContinuityStore::new();
        store.on_liquidation("BTC", 1000.0, 50000.0, 100.0, Side::Buy, 5.0);
        store.decay_and_transition_all(1000.0 + ACTIVE_TO_DORMANT_IDLE_SECS + 1.0);
        assert_eq!(store.nodes("BTC")[0].state, NodeState::Dormant);
    }

    #[test]
    fn decay_is_idempotent_under_repeated_same_timestamp() {
        let mut store = ContinuityStore::new();
        store.on_liquidation("BTC", 1000.0, 50000.0, 100.0, Side::Buy, 5.0);
        store.decay_and_transition_all(1500.0);
        let s1 = store.nodes("BTC")[0].strength();
        store.decay_and_transition_all(1500.0);
        let s2 = store.nodes("BTC")[0].strength();
        assert_eq!(s1, s2);
    }

    #[test]
    fn strength_and_confidence_stay_bounded() {
        let mut store = ContinuityStore::new();
        for i in 0..50 {
            store.on_liquidation("BTC", 1000.0 + i as f64, 50000.0, 1000.0, Side::Buy, 5.0);
        }
        let node = &store.nodes("BTC")[0];
        assert!(node.strength() >= 0.0 && node.strength() <= 1.0);
        assert!(node.confidence() >= 0.0 && node.confidence() <= 1.0);
    }

    #[test]
    fn active_nodes_never_overlap() {
        let mut store = ContinuityStore::new();
        store.on_liquidation("BTC", 1000.0, 50000.0, 100.0, Side::Buy, 5.0);
        store.on_liquidation("BTC", 1001.0, 50100.0, 100.0, Side::Buy, 5.0);
        store.on_liquidation("BTC", 1002.0, 50200.0, 100.0, Side::Buy, 5.0);
        assert!(store.active_nodes_non_overlapping("BTC"));
    }

    /// A liquidation whose price falls outside every existing node's band
    /// can still produce a new-node band that would overlap an ACTIVE
    /// node's band (e.g. node A @100 band 5 spans [95,105]; a liquidation
    /// @109 has |109-100|=9 > 5 so it is not "in" A's band, but a fresh
    /// node centered at 109 with band 5 would span [104,114], overlapping
    /// A on [104,105]). This must reinforce A instead of creating a
    /// second, overlapping ACTIVE node.
    #[test]
    fn liquidation_whose_new_band_would_overlap_reinforces_instead_of_creating() {
        let mut store = ContinuityStore::new();
        store.on_liquidation("BTC", 1000.0, 100.0, 100.0, Side::Buy, 5.0);
        store.on_liquidation("BTC", 1001.0, 109.0, 50.0, Side::Sell, 5.0);
        assert_eq!(store.nodes("BTC").len(), 1);
        assert_eq!(store.nodes("BTC")[0].liquidation_count, 2);
        assert!(store.active_nodes_non_overlapping("BTC"));
    }

    /// Same case but further out (price genuinely outside band-overlap
    /// range too): a real second node is expected.
    #[test]
    fn liquidation_far_enough_away_still_creates_second_node() {
        let mut store = ContinuityStore::new();
        store.on_liquidation("BTC", 1000.0, 100.0, 100.0, Side::Buy, 5.0);
        store.on_liquidation("BTC", 1001.0, 200.0, 50.0, Side::Sell, 5.0);
        assert_eq!(store.nodes("BTC").len(), 2);
        assert!(store.active_nodes_non_overlapping("BTC"));
    }
}
