//! Stock levels, movements, demand forecasts, valuation, turnover and
//! warehouse utilization.

use drift_core::{
    field_rule, CycleError, Delta, DurationWindow, EpochMs, PerturbationRule, RandomSource,
    RuleError, RuleSet, StatusRules, SyncConfig,
};
use drift_engine::{DomainAdapter, MutationContext, SyncStore};
use serde::{Deserialize, Serialize};

use crate::Headline;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
    Overstock,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MovementKind {
    Purchase,
    Sale,
    Adjustment,
    Transfer,
    Return,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Velocity {
    Fast,
    Medium,
    Slow,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StockItem {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub category: String,
    pub current_stock: i64,
    pub minimum_stock: i64,
    pub maximum_stock: i64,
    pub reorder_point: i64,
    pub unit_cost: f64,
    pub unit_price: f64,
    pub location: String,
    pub supplier: String,
    pub last_stock_update: EpochMs,
    pub status: StockStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: String,
    pub item_id: String,
    pub kind: MovementKind,
    /// Signed: sales and write-offs are negative.
    pub quantity: i64,
    pub unit_cost: f64,
    pub total_value: f64,
    pub location: String,
    pub reference: String,
    pub timestamp: EpochMs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A movement as submitted; id, value and timestamp are assigned on apply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewMovement {
    pub item_id: String,
    pub kind: MovementKind,
    pub quantity: i64,
    pub unit_cost: f64,
    pub location: String,
    pub reference: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForecastFactor {
    pub name: String,
    pub impact: f64,
    pub confidence: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DemandForecast {
    pub id: String,
    pub item_id: String,
    pub item_name: String,
    pub current_demand: i64,
    pub predicted_demand: i64,
    pub confidence: f64,
    pub factors: Vec<ForecastFactor>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValuationLine {
    pub category: String,
    pub quantity: i64,
    pub average_cost: f64,
    pub total_value: f64,
    pub percentage: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    pub method: String,
    pub total_value: f64,
    /// Percent deviation from the last physical count.
    pub variance: f64,
    pub cost_of_goods_sold: f64,
    pub last_calculated: EpochMs,
    pub breakdown: Vec<ValuationLine>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub capacity: i64,
    pub current_utilization: i64,
    pub manager: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnoverMetric {
    pub id: String,
    pub item_id: String,
    pub item_name: String,
    pub turnover_ratio: f64,
    pub days_of_supply: i64,
    pub velocity_rating: Velocity,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InventoryData {
    pub items: Vec<StockItem>,
    pub movements: Vec<StockMovement>,
    pub forecasts: Vec<DemandForecast>,
    pub valuation: Valuation,
    pub locations: Vec<Location>,
    pub turnover: Vec<TurnoverMetric>,
}

impl InventoryData {
    pub fn item(&self, id: &str) -> Option<&StockItem> {
        self.items.iter().find(|i| i.id == id)
    }
}

impl Headline for InventoryData {
    fn headline(&self) -> String {
        let count = |s: StockStatus| self.items.iter().filter(|i| i.status == s).count();
        format!(
            "{} items ({} low, {} out, {} over), stock value {:.0}",
            self.items.len(),
            count(StockStatus::LowStock),
            count(StockStatus::OutOfStock),
            count(StockStatus::Overstock),
            self.valuation.total_value
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum InventoryMutation {
    SetStockLevel { item_id: String, stock: i64 },
    RecordMovement(NewMovement),
}

pub struct InventoryAdapter {
    items: RuleSet<StockItem>,
    forecasts: RuleSet<DemandForecast>,
    factors: RuleSet<ForecastFactor>,
    valuation: RuleSet<Valuation>,
    breakdown: RuleSet<ValuationLine>,
    locations: RuleSet<Location>,
    turnover: RuleSet<TurnoverMetric>,
    stock_status: StatusRules<StockItem, StockStatus>,
    velocity: StatusRules<TurnoverMetric, Velocity>,
}

impl InventoryAdapter {
    pub fn new() -> Result<Self, RuleError> {
        Ok(Self {
            items: RuleSet::new(vec![field_rule!(
                StockItem,
                current_stock,
                PerturbationRule::new(Delta::steps(10.0)).floor(0.0)
            )])?,
            forecasts: RuleSet::new(vec![
                field_rule!(
                    DemandForecast,
                    current_demand,
                    PerturbationRule::new(Delta::steps(10.0)).floor(0.0)
                ),
                field_rule!(
                    DemandForecast,
                    predicted_demand,
                    PerturbationRule::new(Delta::steps(15.0)).floor(0.0)
                ),
                field_rule!(
                    DemandForecast,
                    confidence,
                    PerturbationRule::new(Delta::jitter(2.5)).within(50.0, 100.0)
                ),
            ])?,
            factors: RuleSet::new(vec![
                field_rule!(ForecastFactor, impact, PerturbationRule::new(Delta::jitter(1.0))),
                field_rule!(
                    ForecastFactor,
                    confidence,
                    PerturbationRule::new(Delta::jitter(1.5)).within(50.0, 100.0)
                ),
            ])?,
            valuation: RuleSet::new(vec![
                field_rule!(
                    Valuation,
                    total_value,
                    PerturbationRule::new(Delta::relative(0.01)).floor(0.0)
                ),
                field_rule!(
                    Valuation,
                    variance,
                    PerturbationRule::new(Delta::Resample { lo: -2.5, hi: 2.5 })
                ),
            ])?,
            breakdown: RuleSet::new(vec![
                field_rule!(
                    ValuationLine,
                    total_value,
                    PerturbationRule::new(Delta::relative(0.015)).floor(0.0)
                ),
                field_rule!(
                    ValuationLine,
                    average_cost,
                    PerturbationRule::new(Delta::relative(0.01)).floor(0.0)
                ),
            ])?,
            locations: RuleSet::new(vec![field_rule!(
                Location,
                current_utilization,
                PerturbationRule::new(Delta::steps(50.0)).floor(0.0)
            )
            .capped_by(|l: &Location| l.capacity as f64)])?,
            turnover: RuleSet::new(vec![
                field_rule!(
                    TurnoverMetric,
                    turnover_ratio,
                    PerturbationRule::new(Delta::jitter(0.25)).floor(0.5)
                ),
                field_rule!(
                    TurnoverMetric,
                    days_of_supply,
                    PerturbationRule::new(Delta::steps(5.0)).floor(10.0)
                ),
            ])?,
            stock_status: StatusRules::<StockItem, StockStatus>::builder()
                .when(|i: &StockItem| i.current_stock <= 0, StockStatus::OutOfStock)
                .when(|i: &StockItem| i.current_stock <= i.minimum_stock, StockStatus::LowStock)
                .when(|i: &StockItem| i.current_stock >= i.maximum_stock, StockStatus::Overstock)
                .otherwise(StockStatus::InStock),
            velocity: StatusRules::<TurnoverMetric, Velocity>::builder()
                .when(|t: &TurnoverMetric| t.turnover_ratio >= 6.0, Velocity::Fast)
                .when(|t: &TurnoverMetric| t.turnover_ratio >= 3.0, Velocity::Medium)
                .otherwise(Velocity::Slow),
        })
    }

    /// Replaces the stock-item rules, e.g. with a forced delta.
    pub fn with_item_rules(mut self, items: RuleSet<StockItem>) -> Self {
        self.items = items;
        self
    }

    pub fn stock_status(&self, item: &StockItem) -> StockStatus {
        self.stock_status.classify(item)
    }

    fn set_stock(&self, item: &mut StockItem, stock: i64, at: EpochMs) {
        match self.items.get("current_stock") {
            Some(rule) => rule.assign(item, stock as f64),
            None => item.current_stock = stock.max(0),
        }
        item.last_stock_update = at;
        item.status = self.stock_status.classify(item);
    }
}

impl DomainAdapter for InventoryAdapter {
    type Data = InventoryData;
    type Mutation = InventoryMutation;

    fn name(&self) -> &'static str {
        "inventory"
    }

    fn default_config(&self) -> SyncConfig {
        SyncConfig {
            interval: DurationWindow::fixed(30_000),
            latency: DurationWindow::jittered(800, 1_200),
            disconnect_after: DurationWindow::jittered(60_000, 120_000),
            reconnect_after: DurationWindow::fixed(3_000),
            failure_rate: 0.0,
        }
    }

    fn initial(&self) -> InventoryData {
        seed()
    }

    fn reclassify(&self, data: &mut InventoryData) {
        for item in &mut data.items {
            item.status = self.stock_status.classify(item);
        }
        for metric in &mut data.turnover {
            metric.velocity_rating = self.velocity.classify(metric);
        }
    }

    fn perturb(
        &self,
        data: &mut InventoryData,
        rng: &mut dyn RandomSource,
        now: EpochMs,
    ) -> Result<(), CycleError> {
        for item in &mut data.items {
            self.items.apply(item, rng);
            item.last_stock_update = now;
        }
        for forecast in &mut data.forecasts {
            self.forecasts.apply(forecast, rng);
            self.factors.apply_all(&mut forecast.factors, rng);
        }
        self.valuation.apply(&mut data.valuation, rng);
        self.breakdown.apply_all(&mut data.valuation.breakdown, rng);
        data.valuation.last_calculated = now;
        self.turnover.apply_all(&mut data.turnover, rng);
        self.locations.apply_all(&mut data.locations, rng);
        Ok(())
    }

    fn apply(
        &self,
        data: &mut InventoryData,
        mutation: &InventoryMutation,
        ctx: &MutationContext,
    ) -> bool {
        match mutation {
            InventoryMutation::SetStockLevel { item_id, stock } => {
                let Some(item) = data.items.iter_mut().find(|i| i.id == *item_id) else {
                    return false;
                };
                self.set_stock(item, *stock, ctx.at);
                true
            }
            InventoryMutation::RecordMovement(movement) => {
                let Some(item) = data.items.iter_mut().find(|i| i.id == movement.item_id) else {
                    return false;
                };
                let stock = item.current_stock.saturating_add(movement.quantity);
                self.set_stock(item, stock, ctx.at);
                data.movements.insert(
                    0,
                    StockMovement {
                        id: format!("SM-{}", ctx.id),
                        item_id: movement.item_id.clone(),
                        kind: movement.kind,
                        quantity: movement.quantity,
                        unit_cost: movement.unit_cost,
                        total_value: movement.quantity as f64 * movement.unit_cost,
                        location: movement.location.clone(),
                        reference: movement.reference.clone(),
                        timestamp: ctx.at,
                        notes: movement.notes.clone(),
                    },
                );
                true
            }
        }
    }
}

/// Inventory edits on a running store.
pub trait InventoryActions {
    /// Sets an item's stock (floored at zero) and re-derives its status.
    fn update_stock_level(&self, item_id: &str, stock: i64) -> bool;
    /// Logs a movement and adjusts the item's stock by its quantity.
    fn add_stock_movement(&self, movement: NewMovement) -> bool;
}

impl InventoryActions for SyncStore<InventoryAdapter> {
    fn update_stock_level(&self, item_id: &str, stock: i64) -> bool {
        self.mutate(InventoryMutation::SetStockLevel {
            item_id: item_id.to_string(),
            stock,
        })
    }

    fn add_stock_movement(&self, movement: NewMovement) -> bool {
        self.mutate(InventoryMutation::RecordMovement(movement))
    }
}

fn seed() -> InventoryData {
    InventoryData {
        items: vec![
            StockItem {
                id: "1".into(),
                sku: "TECH-001".into(),
                name: "Wireless Bluetooth Headphones".into(),
                category: "Electronics".into(),
                current_stock: 245,
                minimum_stock: 50,
                maximum_stock: 500,
                reorder_point: 75,
                unit_cost: 45.5,
                unit_price: 89.99,
                location: "Warehouse A".into(),
                supplier: "TechSupply Co".into(),
                last_stock_update: 1_733_992_200_000,
                status: StockStatus::InStock,
            },
            StockItem {
                id: "2".into(),
                sku: "HOME-025".into(),
                name: "Smart Coffee Maker".into(),
                category: "Appliances".into(),
                current_stock: 15,
                minimum_stock: 20,
                maximum_stock: 100,
                reorder_point: 25,
                unit_cost: 125.0,
                unit_price: 249.99,
                location: "Warehouse B".into(),
                supplier: "HomeGoods Inc".into(),
                last_stock_update: 1_733_935_500_000,
                status: StockStatus::LowStock,
            },
            StockItem {
                id: "3".into(),
                sku: "FASH-112".into(),
                name: "Designer Running Shoes".into(),
                category: "Footwear".into(),
                current_stock: 0,
                minimum_stock: 30,
                maximum_stock: 200,
                reorder_point: 40,
                unit_cost: 65.0,
                unit_price: 149.99,
                location: "Store Front".into(),
                supplier: "Fashion Direct".into(),
                last_stock_update: 1_733_832_000_000,
                status: StockStatus::OutOfStock,
            },
            StockItem {
                id: "4".into(),
                sku: "OFFICE-089".into(),
                name: "Ergonomic Office Chair".into(),
                category: "Furniture".into(),
                current_stock: 185,
                minimum_stock: 25,
                maximum_stock: 150,
                reorder_point: 35,
                unit_cost: 180.0,
                unit_price: 399.99,
                location: "Warehouse A".into(),
                supplier: "Office Pro Ltd".into(),
                last_stock_update: 1_733_994_900_000,
                status: StockStatus::Overstock,
            },
        ],
        movements: vec![
            StockMovement {
                id: "1".into(),
                item_id: "1".into(),
                kind: MovementKind::Sale,
                quantity: -25,
                unit_cost: 45.5,
                total_value: -1_137.5,
                location: "Warehouse A".into(),
                reference: "ORD-2024-1205".into(),
                timestamp: 1_733_999_400_000,
                notes: Some("Bulk order to Electronics Plus".into()),
            },
            StockMovement {
                id: "2".into(),
                item_id: "2".into(),
                kind: MovementKind::Purchase,
                quantity: 50,
                unit_cost: 125.0,
                total_value: 6_250.0,
                location: "Warehouse B".into(),
                reference: "PO-2024-0892".into(),
                timestamp: 1_733_926_800_000,
                notes: Some("Quarterly restock".into()),
            },
            StockMovement {
                id: "3".into(),
                item_id: "3".into(),
                kind: MovementKind::Sale,
                quantity: -8,
                unit_cost: 65.0,
                total_value: -520.0,
                location: "Store Front".into(),
                reference: "SALE-2024-3401".into(),
                timestamp: 1_733_849_100_000,
                notes: Some("Holiday promotion sales".into()),
            },
        ],
        forecasts: vec![
            DemandForecast {
                id: "1".into(),
                item_id: "1".into(),
                item_name: "Wireless Bluetooth Headphones".into(),
                current_demand: 180,
                predicted_demand: 220,
                confidence: 87.0,
                factors: vec![
                    factor("Holiday Season", 25.0, 92.0),
                    factor("Marketing Campaign", 15.0, 78.0),
                    factor("Competitor Launch", -8.0, 65.0),
                ],
            },
            DemandForecast {
                id: "2".into(),
                item_id: "2".into(),
                item_name: "Smart Coffee Maker".into(),
                current_demand: 45,
                predicted_demand: 65,
                confidence: 74.0,
                factors: vec![
                    factor("Winter Season", 30.0, 88.0),
                    factor("New Features", 12.0, 70.0),
                ],
            },
        ],
        valuation: Valuation {
            method: "FIFO".into(),
            total_value: 2_847_500.0,
            variance: -2.3,
            cost_of_goods_sold: 1_245_800.0,
            last_calculated: 1_733_983_200_000,
            breakdown: vec![
                line("Electronics", 1_245, 85.5, 106_447.5, 37.4),
                line("Appliances", 875, 165.0, 144_375.0, 50.7),
                line("Footwear", 450, 58.75, 26_437.5, 9.3),
                line("Furniture", 125, 195.8, 24_475.0, 8.6),
            ],
        },
        locations: vec![
            location("1", "Warehouse A", 10_000, 7_850, "John Smith"),
            location("2", "Warehouse B", 8_000, 6_200, "Sarah Johnson"),
            location("3", "Store Front", 2_000, 1_650, "Mike Chen"),
        ],
        turnover: vec![
            turnover("1", "1", "Wireless Bluetooth Headphones", 8.5, 43),
            turnover("2", "2", "Smart Coffee Maker", 4.2, 87),
            turnover("3", "4", "Ergonomic Office Chair", 1.8, 203),
        ],
    }
}

fn factor(name: &str, impact: f64, confidence: f64) -> ForecastFactor {
    ForecastFactor {
        name: name.into(),
        impact,
        confidence,
    }
}

fn line(category: &str, quantity: i64, average_cost: f64, total_value: f64, pct: f64) -> ValuationLine {
    ValuationLine {
        category: category.into(),
        quantity,
        average_cost,
        total_value,
        percentage: pct,
    }
}

fn location(id: &str, name: &str, capacity: i64, used: i64, manager: &str) -> Location {
    Location {
        id: id.into(),
        name: name.into(),
        capacity,
        current_utilization: used,
        manager: manager.into(),
    }
}

fn turnover(id: &str, item_id: &str, item_name: &str, ratio: f64, days: i64) -> TurnoverMetric {
    TurnoverMetric {
        id: id.into(),
        item_id: item_id.into(),
        item_name: item_name.into(),
        turnover_ratio: ratio,
        days_of_supply: days,
        velocity_rating: Velocity::Slow,
    }
}

#[cfg(test)]
mod tests {
    use drift_core::{SeededRandom, Sequence};
    use drift_engine::advance;

    use super::*;

    fn ctx() -> MutationContext {
        MutationContext::new(1_734_000_000_000)
    }

    #[test]
    fn seed_statuses_match_the_rules() {
        let adapter = InventoryAdapter::new().unwrap();
        let mut data = adapter.initial();
        let before = data.clone();
        adapter.reclassify(&mut data);
        for (a, b) in before.items.iter().zip(&data.items) {
            assert_eq!(a.status, b.status, "{}", a.name);
        }
        let ratings: Vec<_> = data.turnover.iter().map(|t| t.velocity_rating).collect();
        assert_eq!(ratings, vec![Velocity::Fast, Velocity::Medium, Velocity::Slow]);
    }

    #[test]
    fn stock_movement_is_logged_and_adjusts_stock() {
        let adapter = InventoryAdapter::new().unwrap();
        let mut data = adapter.initial();
        let ctx = ctx();
        let applied = adapter.apply(
            &mut data,
            &InventoryMutation::RecordMovement(NewMovement {
                item_id: "1".into(),
                kind: MovementKind::Sale,
                quantity: -25,
                unit_cost: 45.5,
                location: "Warehouse A".into(),
                reference: "ORD-1".into(),
                notes: None,
            }),
            &ctx,
        );
        assert!(applied);
        assert_eq!(data.item("1").unwrap().current_stock, 220);
        assert_eq!(data.item("1").unwrap().last_stock_update, ctx.at);
        assert_eq!(data.movements.len(), 4);
        assert_eq!(data.movements[0].id, format!("SM-{}", ctx.id));
        assert_eq!(data.movements[0].total_value, -1_137.5);
    }

    #[test]
    fn stock_level_edits_are_floored_and_reclassified() {
        let adapter = InventoryAdapter::new().unwrap();
        let mut data = adapter.initial();
        let set = |id: &str, stock| InventoryMutation::SetStockLevel {
            item_id: id.into(),
            stock,
        };

        assert!(adapter.apply(&mut data, &set("1", -30), &ctx()));
        assert_eq!(data.item("1").unwrap().current_stock, 0);
        assert_eq!(data.item("1").unwrap().status, StockStatus::OutOfStock);

        assert!(adapter.apply(&mut data, &set("1", 50), &ctx()));
        assert_eq!(data.item("1").unwrap().status, StockStatus::LowStock);

        assert!(adapter.apply(&mut data, &set("1", 500), &ctx()));
        assert_eq!(data.item("1").unwrap().status, StockStatus::Overstock);

        let before = data.clone();
        assert!(!adapter.apply(&mut data, &set("nope", 5), &ctx()));
        assert_eq!(data, before);
    }

    #[test]
    fn utilization_never_exceeds_capacity() {
        let adapter = InventoryAdapter::new().unwrap();
        let mut data = adapter.initial();
        for l in &mut data.locations {
            l.current_utilization = l.capacity;
        }
        let mut rng = SeededRandom::new(5);
        for _ in 0..200 {
            data = advance(&adapter, &data, &mut rng, 0).unwrap();
            for l in &data.locations {
                assert!((0..=l.capacity).contains(&l.current_utilization));
            }
            for f in &data.forecasts {
                assert!((50.0..=100.0).contains(&f.confidence));
                assert!(f.current_demand >= 0);
            }
            assert!(data.turnover.iter().all(|t| t.turnover_ratio >= 0.5));
        }
    }

    #[test]
    fn cycle_stamps_items_and_valuation() {
        let adapter = InventoryAdapter::new().unwrap();
        let data = adapter.initial();
        let next = advance(&adapter, &data, &mut Sequence::constant(0.5), 42).unwrap();
        assert!(next.items.iter().all(|i| i.last_stock_update == 42));
        assert_eq!(next.valuation.last_calculated, 42);
        // A centred sample is a zero step.
        assert_eq!(next.item("1").unwrap().current_stock, 245);
        assert_eq!(next.valuation.variance, 0.0);
    }
}
