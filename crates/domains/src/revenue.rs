//! Revenue streams, churn, upsell pipeline, headline metrics, channel
//! performance and discount analysis. Read-only: the dashboard has no
//! manual edits.

use std::convert::Infallible;

use drift_core::{
    field_rule, CycleError, Delta, DurationWindow, EpochMs, PerturbationRule, RandomSource,
    RuleError, RuleSet, StatusRules, SyncConfig,
};
use drift_engine::{DomainAdapter, MutationContext};
use serde::{Deserialize, Serialize};

use crate::Headline;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamKind {
    Subscription,
    OneTime,
    UsageBased,
    Commission,
    Advertising,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChurnRisk {
    High,
    Medium,
    Low,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RevenueStream {
    pub id: String,
    pub name: String,
    pub kind: StreamKind,
    pub current_revenue: f64,
    pub forecast_revenue: f64,
    pub growth: f64,
    pub margin: f64,
    pub customers: i64,
    pub avg_revenue_per_customer: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChurnSegment {
    pub id: String,
    pub segment: String,
    /// Monthly churn, in percent.
    pub churn_rate: f64,
    pub customers: i64,
    pub revenue_at_risk: f64,
    pub risk: ChurnRisk,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpsellOpportunity {
    pub id: String,
    pub customer: String,
    pub current_plan: String,
    pub suggested_plan: String,
    pub current_mrr: f64,
    pub potential_mrr: f64,
    pub probability_score: f64,
    pub days_to_upgrade: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RevenueMetric {
    pub id: String,
    pub name: String,
    pub value: f64,
    pub unit: String,
    /// Period-over-period change, in percent.
    pub change: f64,
    pub trend: Trend,
    pub period: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelPerformance {
    pub id: String,
    pub channel: String,
    pub revenue: f64,
    pub customers: i64,
    pub avg_order_value: f64,
    pub acquisition_cost: f64,
    pub profitability: f64,
    pub growth: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscountAnalysis {
    pub id: String,
    pub discount_type: String,
    pub discount_rate: f64,
    pub usage: f64,
    pub revenue_impact: f64,
    pub conversion_lift: f64,
    pub margin_impact: f64,
    pub customer_segment: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RevenueData {
    pub streams: Vec<RevenueStream>,
    pub churn: Vec<ChurnSegment>,
    pub upsells: Vec<UpsellOpportunity>,
    pub metrics: Vec<RevenueMetric>,
    pub channels: Vec<ChannelPerformance>,
    pub discounts: Vec<DiscountAnalysis>,
}

impl Headline for RevenueData {
    fn headline(&self) -> String {
        let total: f64 = self.streams.iter().map(|s| s.current_revenue).sum();
        let at_risk = self
            .churn
            .iter()
            .filter(|c| c.risk == ChurnRisk::High)
            .count();
        format!(
            "{} streams, revenue {:.0}, {} high-risk segments",
            self.streams.len(),
            total,
            at_risk
        )
    }
}

pub struct RevenueAdapter {
    streams: RuleSet<RevenueStream>,
    churn: RuleSet<ChurnSegment>,
    upsells: RuleSet<UpsellOpportunity>,
    metrics: RuleSet<RevenueMetric>,
    channels: RuleSet<ChannelPerformance>,
    discounts: RuleSet<DiscountAnalysis>,
    churn_risk: StatusRules<ChurnSegment, ChurnRisk>,
    trend: StatusRules<RevenueMetric, Trend>,
}

impl RevenueAdapter {
    pub fn new() -> Result<Self, RuleError> {
        Ok(Self {
            streams: RuleSet::new(vec![
                field_rule!(
                    RevenueStream,
                    current_revenue,
                    PerturbationRule::new(Delta::relative(0.025)).floor(0.0)
                ),
                field_rule!(
                    RevenueStream,
                    forecast_revenue,
                    PerturbationRule::new(Delta::relative(0.04)).floor(0.0)
                ),
                field_rule!(RevenueStream, growth, PerturbationRule::new(Delta::jitter(2.5))),
                field_rule!(
                    RevenueStream,
                    customers,
                    PerturbationRule::new(Delta::steps(10.0)).floor(0.0)
                ),
                field_rule!(
                    RevenueStream,
                    avg_revenue_per_customer,
                    PerturbationRule::new(Delta::relative(0.015)).floor(0.0)
                ),
            ])?,
            churn: RuleSet::new(vec![
                field_rule!(
                    ChurnSegment,
                    churn_rate,
                    PerturbationRule::new(Delta::jitter(0.25)).floor(0.0)
                ),
                field_rule!(
                    ChurnSegment,
                    revenue_at_risk,
                    PerturbationRule::new(Delta::relative(0.05)).floor(0.0)
                ),
            ])?,
            upsells: RuleSet::new(vec![
                field_rule!(
                    UpsellOpportunity,
                    probability_score,
                    PerturbationRule::new(Delta::jitter(5.0)).within(0.0, 100.0)
                ),
                field_rule!(
                    UpsellOpportunity,
                    days_to_upgrade,
                    PerturbationRule::new(Delta::steps(5.0)).floor(7.0)
                ),
            ])?,
            metrics: RuleSet::new(vec![
                field_rule!(
                    RevenueMetric,
                    value,
                    PerturbationRule::new(Delta::relative(0.015))
                ),
                field_rule!(
                    RevenueMetric,
                    change,
                    PerturbationRule::new(Delta::Resample { lo: -4.0, hi: 4.0 })
                ),
            ])?,
            channels: RuleSet::new(vec![
                field_rule!(
                    ChannelPerformance,
                    revenue,
                    PerturbationRule::new(Delta::relative(0.02)).floor(0.0)
                ),
                field_rule!(
                    ChannelPerformance,
                    customers,
                    PerturbationRule::new(Delta::steps(15.0)).floor(0.0)
                ),
                field_rule!(
                    ChannelPerformance,
                    avg_order_value,
                    PerturbationRule::new(Delta::relative(0.01)).floor(0.0)
                ),
                field_rule!(
                    ChannelPerformance,
                    acquisition_cost,
                    PerturbationRule::new(Delta::relative(0.025)).floor(0.0)
                ),
                field_rule!(ChannelPerformance, growth, PerturbationRule::new(Delta::jitter(1.5))),
            ])?,
            discounts: RuleSet::new(vec![
                field_rule!(
                    DiscountAnalysis,
                    usage,
                    PerturbationRule::new(Delta::jitter(1.0)).floor(0.0)
                ),
                field_rule!(
                    DiscountAnalysis,
                    revenue_impact,
                    PerturbationRule::new(Delta::jitter(1.5))
                ),
                field_rule!(
                    DiscountAnalysis,
                    conversion_lift,
                    PerturbationRule::new(Delta::jitter(2.5)).floor(0.0)
                ),
            ])?,
            churn_risk: StatusRules::<ChurnSegment, ChurnRisk>::builder()
                .when(|c: &ChurnSegment| c.churn_rate >= 10.0, ChurnRisk::High)
                .when(|c: &ChurnSegment| c.churn_rate >= 5.0, ChurnRisk::Medium)
                .otherwise(ChurnRisk::Low),
            trend: StatusRules::<RevenueMetric, Trend>::builder()
                .when(|m: &RevenueMetric| m.change > 0.5, Trend::Up)
                .when(|m: &RevenueMetric| m.change < -0.5, Trend::Down)
                .otherwise(Trend::Stable),
        })
    }
}

impl DomainAdapter for RevenueAdapter {
    type Data = RevenueData;
    type Mutation = Infallible;

    fn name(&self) -> &'static str {
        "revenue"
    }

    fn default_config(&self) -> SyncConfig {
        SyncConfig {
            interval: DurationWindow::fixed(25_000),
            latency: DurationWindow::jittered(800, 1_500),
            disconnect_after: DurationWindow::jittered(45_000, 90_000),
            reconnect_after: DurationWindow::fixed(3_000),
            failure_rate: 0.0,
        }
    }

    fn initial(&self) -> RevenueData {
        seed()
    }

    fn reclassify(&self, data: &mut RevenueData) {
        for c in &mut data.churn {
            c.risk = self.churn_risk.classify(c);
        }
        for m in &mut data.metrics {
            m.trend = self.trend.classify(m);
        }
    }

    fn perturb(
        &self,
        data: &mut RevenueData,
        rng: &mut dyn RandomSource,
        _now: EpochMs,
    ) -> Result<(), CycleError> {
        self.streams.apply_all(&mut data.streams, rng);
        self.churn.apply_all(&mut data.churn, rng);
        self.upsells.apply_all(&mut data.upsells, rng);
        self.metrics.apply_all(&mut data.metrics, rng);
        self.channels.apply_all(&mut data.channels, rng);
        self.discounts.apply_all(&mut data.discounts, rng);
        Ok(())
    }

    fn apply(&self, _data: &mut RevenueData, mutation: &Infallible, _ctx: &MutationContext) -> bool {
        match *mutation {}
    }
}

fn seed() -> RevenueData {
    RevenueData {
        streams: vec![
            stream("1", "SaaS Subscriptions", StreamKind::Subscription, 2_840_000.0, 3_420_000.0, 20.4, 78.5, 1_247, 2_278.0),
            stream("2", "Professional Services", StreamKind::OneTime, 920_000.0, 1_150_000.0, 25.0, 45.2, 186, 4_946.0),
            stream("3", "API Usage", StreamKind::UsageBased, 486_000.0, 683_000.0, 40.5, 85.1, 2_341, 208.0),
            stream("4", "Marketplace Commission", StreamKind::Commission, 1_560_000.0, 1_950_000.0, 25.0, 92.3, 856, 1_822.0),
        ],
        churn: vec![
            churn("1", "Enterprise", 3.2, 147, 890_000.0),
            churn("2", "SMB", 8.7, 823, 245_000.0),
            churn("3", "Startup", 12.4, 1_456, 178_000.0),
        ],
        upsells: vec![
            upsell("1", "TechCorp Industries", "Professional", "Enterprise", 2_499.0, 4_999.0, 87.0, 45),
            upsell("2", "StartupX Inc", "Basic", "Professional", 99.0, 299.0, 72.0, 30),
            upsell("3", "GlobalSoft Ltd", "Professional", "Enterprise", 1_899.0, 3_499.0, 94.0, 15),
        ],
        metrics: vec![
            metric("1", "Monthly Recurring Revenue", 486_750.0, "$", 12.8, "This month"),
            metric("2", "Annual Contract Value", 28_400.0, "$", 8.4, "Q3 2024"),
            metric("3", "Customer Lifetime Value", 14_250.0, "$", -2.1, "Last 90 days"),
            metric("4", "Revenue per Customer", 2_847.0, "$", 15.6, "This quarter"),
            metric("5", "Gross Revenue Retention", 94.2, "%", 1.8, "Last 12 months"),
            metric("6", "Net Revenue Retention", 118.5, "%", 4.2, "Last 12 months"),
        ],
        channels: vec![
            channel("1", "Direct Sales", 3_240_000.0, 456, 7_105.0, 840.0, 68.5, 22.4),
            channel("2", "Partner Network", 1_890_000.0, 1_247, 1_516.0, 245.0, 45.2, 35.8),
            channel("3", "Online Marketplace", 920_000.0, 2_341, 393.0, 48.0, 38.7, 67.2),
            channel("4", "Referral Program", 485_000.0, 823, 589.0, 32.0, 82.1, 45.6),
        ],
        discounts: vec![
            discount("1", "Early Bird", 15.0, 23.4, -8.2, 34.6, -12.1, "New Customers"),
            discount("2", "Volume Discount", 20.0, 12.7, 18.5, 67.8, -15.3, "Enterprise"),
            discount("3", "Loyalty Discount", 10.0, 8.9, 2.4, 12.3, -7.8, "Existing Customers"),
        ],
    }
}

#[allow(clippy::too_many_arguments)]
fn stream(
    id: &str,
    name: &str,
    kind: StreamKind,
    current: f64,
    forecast: f64,
    growth: f64,
    margin: f64,
    customers: i64,
    arpc: f64,
) -> RevenueStream {
    RevenueStream {
        id: id.into(),
        name: name.into(),
        kind,
        current_revenue: current,
        forecast_revenue: forecast,
        growth,
        margin,
        customers,
        avg_revenue_per_customer: arpc,
    }
}

fn churn(id: &str, segment: &str, rate: f64, customers: i64, at_risk: f64) -> ChurnSegment {
    ChurnSegment {
        id: id.into(),
        segment: segment.into(),
        churn_rate: rate,
        customers,
        revenue_at_risk: at_risk,
        risk: ChurnRisk::Low,
    }
}

#[allow(clippy::too_many_arguments)]
fn upsell(
    id: &str,
    customer: &str,
    current_plan: &str,
    suggested_plan: &str,
    current_mrr: f64,
    potential_mrr: f64,
    probability: f64,
    days: i64,
) -> UpsellOpportunity {
    UpsellOpportunity {
        id: id.into(),
        customer: customer.into(),
        current_plan: current_plan.into(),
        suggested_plan: suggested_plan.into(),
        current_mrr,
        potential_mrr,
        probability_score: probability,
        days_to_upgrade: days,
    }
}

fn metric(id: &str, name: &str, value: f64, unit: &str, change: f64, period: &str) -> RevenueMetric {
    RevenueMetric {
        id: id.into(),
        name: name.into(),
        value,
        unit: unit.into(),
        change,
        trend: Trend::Stable,
        period: period.into(),
    }
}

#[allow(clippy::too_many_arguments)]
fn channel(
    id: &str,
    name: &str,
    revenue: f64,
    customers: i64,
    aov: f64,
    cac: f64,
    profitability: f64,
    growth: f64,
) -> ChannelPerformance {
    ChannelPerformance {
        id: id.into(),
        channel: name.into(),
        revenue,
        customers,
        avg_order_value: aov,
        acquisition_cost: cac,
        profitability,
        growth,
    }
}

#[allow(clippy::too_many_arguments)]
fn discount(
    id: &str,
    kind: &str,
    rate: f64,
    usage: f64,
    revenue_impact: f64,
    lift: f64,
    margin_impact: f64,
    segment: &str,
) -> DiscountAnalysis {
    DiscountAnalysis {
        id: id.into(),
        discount_type: kind.into(),
        discount_rate: rate,
        usage,
        revenue_impact,
        conversion_lift: lift,
        margin_impact,
        customer_segment: segment.into(),
    }
}
