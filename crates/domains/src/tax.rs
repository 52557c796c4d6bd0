//! Tax calculations, savings recommendations, compliance updates and
//! reports, with an audit trail fed by every edit and every cycle.

use drift_core::{
    field_rule, CycleError, Delta, DurationWindow, EpochMs, PerturbationRule, RandomSource,
    RuleError, RuleSet, StatusRules, SyncConfig,
};
use drift_engine::{DomainAdapter, MutationContext, SyncStore};
use serde::{Deserialize, Serialize};

use crate::Headline;

/// Oldest entries fall off the trail beyond this length.
pub const AUDIT_TRAIL_LIMIT: usize = 20;

const SYSTEM_CHECKS: [&str; 4] = [
    "Tax Calculation Refreshed",
    "Document Accessed",
    "Compliance Check",
    "Report Generated",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CalculationStatus {
    Draft,
    Calculated,
    Filed,
    Amended,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComplianceStatus {
    New,
    Reviewed,
    Implemented,
    Archived,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportStatus {
    Draft,
    Pending,
    Completed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditCategory {
    Calculation,
    Filing,
    Document,
    Planning,
    Compliance,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaxCalculation {
    pub id: String,
    pub entity: String,
    pub tax_year: i32,
    pub income: f64,
    pub deductions: f64,
    pub taxable_income: f64,
    pub estimated_tax: f64,
    pub effective_rate: f64,
    pub marginal_rate: f64,
    pub status: CalculationStatus,
    pub last_updated: EpochMs,
}

/// Partial update of a [`TaxCalculation`]. Changing income or deductions
/// recomputes taxable income.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculationPatch {
    pub income: Option<f64>,
    pub deductions: Option<f64>,
    pub estimated_tax: Option<f64>,
    pub effective_rate: Option<f64>,
    pub status: Option<CalculationStatus>,
}

impl CalculationPatch {
    /// Names of the fields this patch sets, in declaration order.
    pub fn fields(&self) -> Vec<&'static str> {
        [
            ("income", self.income.is_some()),
            ("deductions", self.deductions.is_some()),
            ("estimated_tax", self.estimated_tax.is_some()),
            ("effective_rate", self.effective_rate.is_some()),
            ("status", self.status.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaxRecommendation {
    pub id: String,
    pub title: String,
    pub category: String,
    pub potential_savings: f64,
    pub implemented: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComplianceUpdate {
    pub id: String,
    pub title: String,
    pub jurisdiction: String,
    pub status: ComplianceStatus,
    pub action_required: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub id: String,
    pub title: String,
    pub period: String,
    pub assignee: String,
    pub completion_rate: f64,
    pub risk_score: f64,
    pub findings: i64,
    pub status: ReportStatus,
    pub risk_level: RiskLevel,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    pub at: EpochMs,
    pub user: String,
    pub action: String,
    pub entity: String,
    pub details: String,
    pub category: AuditCategory,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaxData {
    pub calculations: Vec<TaxCalculation>,
    pub recommendations: Vec<TaxRecommendation>,
    pub compliance_updates: Vec<ComplianceUpdate>,
    pub reports: Vec<ComplianceReport>,
    /// Newest first, at most [`AUDIT_TRAIL_LIMIT`] entries.
    pub audit_trail: Vec<AuditEvent>,
}

impl TaxData {
    fn record(&mut self, event: AuditEvent) {
        self.audit_trail.insert(0, event);
        self.audit_trail.truncate(AUDIT_TRAIL_LIMIT);
    }
}

impl Headline for TaxData {
    fn headline(&self) -> String {
        let due: f64 = self.calculations.iter().map(|c| c.estimated_tax).sum();
        let open = self
            .recommendations
            .iter()
            .filter(|r| !r.implemented)
            .count();
        format!(
            "estimated tax {:.0}, {} open recommendations, {} audit events",
            due,
            open,
            self.audit_trail.len()
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TaxMutation {
    UpdateCalculation { id: String, patch: CalculationPatch },
    ImplementRecommendation { id: String },
    UpdateComplianceStatus { id: String, status: ComplianceStatus },
}

pub struct TaxAdapter {
    calculations: RuleSet<TaxCalculation>,
    recommendations: RuleSet<TaxRecommendation>,
    reports: RuleSet<ComplianceReport>,
    report_status: StatusRules<ComplianceReport, ReportStatus>,
    risk_level: StatusRules<ComplianceReport, RiskLevel>,
    operator: String,
}

impl TaxAdapter {
    pub fn new() -> Result<Self, RuleError> {
        Ok(Self {
            calculations: RuleSet::new(vec![
                field_rule!(
                    TaxCalculation,
                    estimated_tax,
                    PerturbationRule::new(Delta::relative(0.02)).floor(0.0)
                ),
                field_rule!(
                    TaxCalculation,
                    effective_rate,
                    PerturbationRule::new(Delta::jitter(1.0)).within(15.0, 35.0)
                ),
            ])?,
            recommendations: RuleSet::new(vec![field_rule!(
                TaxRecommendation,
                potential_savings,
                PerturbationRule::new(Delta::relative(0.05)).floor(0.0)
            )])?,
            reports: RuleSet::new(vec![
                field_rule!(
                    ComplianceReport,
                    completion_rate,
                    PerturbationRule::new(Delta::Additive { lo: 0.0, hi: 2.0 }).within(0.0, 100.0)
                ),
                field_rule!(
                    ComplianceReport,
                    risk_score,
                    PerturbationRule::new(Delta::jitter(2.5)).within(0.0, 100.0)
                ),
            ])?,
            report_status: StatusRules::<ComplianceReport, ReportStatus>::builder()
                .when(|r: &ComplianceReport| r.completion_rate >= 95.0, ReportStatus::Completed)
                .when(|r: &ComplianceReport| r.completion_rate >= 25.0, ReportStatus::Pending)
                .otherwise(ReportStatus::Draft),
            risk_level: StatusRules::<ComplianceReport, RiskLevel>::builder()
                .when(|r: &ComplianceReport| r.risk_score >= 60.0, RiskLevel::High)
                .when(|r: &ComplianceReport| r.risk_score >= 30.0, RiskLevel::Medium)
                .otherwise(RiskLevel::Low),
            operator: "operator".to_string(),
        })
    }

    /// User recorded on audit events for manual edits.
    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = operator.into();
        self
    }

    fn audit(
        &self,
        ctx: &MutationContext,
        action: &str,
        entity: String,
        details: String,
        category: AuditCategory,
    ) -> AuditEvent {
        AuditEvent {
            id: format!("AE-{}", ctx.id),
            at: ctx.at,
            user: self.operator.clone(),
            action: action.to_string(),
            entity,
            details,
            category,
        }
    }

    fn patch_calculation(&self, calc: &mut TaxCalculation, patch: &CalculationPatch, at: EpochMs) {
        if let Some(income) = patch.income {
            calc.income = income.max(0.0);
        }
        if let Some(deductions) = patch.deductions {
            calc.deductions = deductions.max(0.0);
        }
        if patch.income.is_some() || patch.deductions.is_some() {
            calc.taxable_income = (calc.income - calc.deductions).max(0.0);
        }
        for (field, value) in [
            ("estimated_tax", patch.estimated_tax),
            ("effective_rate", patch.effective_rate),
        ] {
            if let (Some(v), Some(rule)) = (value, self.calculations.get(field)) {
                rule.assign(calc, v);
            }
        }
        if let Some(status) = patch.status {
            calc.status = status;
        }
        calc.last_updated = at;
    }
}

impl DomainAdapter for TaxAdapter {
    type Data = TaxData;
    type Mutation = TaxMutation;

    fn name(&self) -> &'static str {
        "tax"
    }

    fn default_config(&self) -> SyncConfig {
        SyncConfig {
            interval: DurationWindow::jittered(10_000, 15_000),
            latency: DurationWindow::jittered(1_200, 800),
            disconnect_after: DurationWindow::jittered(90_000, 150_000),
            reconnect_after: DurationWindow::jittered(3_000, 1_000),
            failure_rate: 0.0,
        }
    }

    fn initial(&self) -> TaxData {
        seed()
    }

    fn reclassify(&self, data: &mut TaxData) {
        for r in &mut data.reports {
            r.status = self.report_status.classify(r);
            r.risk_level = self.risk_level.classify(r);
        }
    }

    fn perturb(
        &self,
        data: &mut TaxData,
        rng: &mut dyn RandomSource,
        now: EpochMs,
    ) -> Result<(), CycleError> {
        for calc in &mut data.calculations {
            self.calculations.apply(calc, rng);
            calc.last_updated = now;
        }
        self.recommendations.apply_all(&mut data.recommendations, rng);
        self.reports.apply_all(&mut data.reports, rng);

        let action = SYSTEM_CHECKS[rng.index(SYSTEM_CHECKS.len())];
        let entity = if data.calculations.is_empty() {
            "Tax Planning".to_string()
        } else {
            data.calculations[rng.index(data.calculations.len())]
                .entity
                .clone()
        };
        data.record(AuditEvent {
            id: format!("SYS-{now}"),
            at: now,
            user: "system".to_string(),
            action: action.to_string(),
            entity,
            details: "Automated system update".to_string(),
            category: AuditCategory::Compliance,
        });
        Ok(())
    }

    fn apply(&self, data: &mut TaxData, mutation: &TaxMutation, ctx: &MutationContext) -> bool {
        let event = match mutation {
            TaxMutation::UpdateCalculation { id, patch } => {
                let Some(calc) = data.calculations.iter_mut().find(|c| c.id == *id) else {
                    return false;
                };
                self.patch_calculation(calc, patch, ctx.at);
                self.audit(
                    ctx,
                    "Tax Calculation Modified",
                    calc.entity.clone(),
                    format!("Updated calculation: {}", patch.fields().join(", ")),
                    AuditCategory::Calculation,
                )
            }
            TaxMutation::ImplementRecommendation { id } => {
                let Some(rec) = data.recommendations.iter_mut().find(|r| r.id == *id) else {
                    return false;
                };
                if rec.implemented {
                    return false;
                }
                rec.implemented = true;
                self.audit(
                    ctx,
                    "Tax Recommendation Implemented",
                    "Tax Planning".to_string(),
                    format!("Implemented recommendation: {id}"),
                    AuditCategory::Planning,
                )
            }
            TaxMutation::UpdateComplianceStatus { id, status } => {
                let Some(update) = data.compliance_updates.iter_mut().find(|u| u.id == *id) else {
                    return false;
                };
                update.status = *status;
                self.audit(
                    ctx,
                    "Compliance Status Changed",
                    update.title.clone(),
                    format!("Compliance update {id} marked {status:?}"),
                    AuditCategory::Compliance,
                )
            }
        };
        data.record(event);
        true
    }
}

/// Tax edits on a running store.
pub trait TaxActions {
    fn update_calculation(&self, id: &str, patch: CalculationPatch) -> bool;
    fn implement_recommendation(&self, id: &str) -> bool;
    fn update_compliance_status(&self, id: &str, status: ComplianceStatus) -> bool;
}

impl TaxActions for SyncStore<TaxAdapter> {
    fn update_calculation(&self, id: &str, patch: CalculationPatch) -> bool {
        self.mutate(TaxMutation::UpdateCalculation {
            id: id.to_string(),
            patch,
        })
    }

    fn implement_recommendation(&self, id: &str) -> bool {
        self.mutate(TaxMutation::ImplementRecommendation { id: id.to_string() })
    }

    fn update_compliance_status(&self, id: &str, status: ComplianceStatus) -> bool {
        self.mutate(TaxMutation::UpdateComplianceStatus {
            id: id.to_string(),
            status,
        })
    }
}

fn seed() -> TaxData {
    TaxData {
        calculations: vec![
            TaxCalculation {
                id: "1".into(),
                entity: "ABC Corporation".into(),
                tax_year: 2024,
                income: 5_200_000.0,
                deductions: 1_150_000.0,
                taxable_income: 4_050_000.0,
                estimated_tax: 850_500.0,
                effective_rate: 21.0,
                marginal_rate: 21.0,
                status: CalculationStatus::Calculated,
                last_updated: 1_734_258_600_000,
            },
            TaxCalculation {
                id: "2".into(),
                entity: "XYZ Holdings LLC".into(),
                tax_year: 2024,
                income: 1_850_000.0,
                deductions: 420_000.0,
                taxable_income: 1_430_000.0,
                estimated_tax: 300_300.0,
                effective_rate: 21.0,
                marginal_rate: 21.0,
                status: CalculationStatus::Draft,
                last_updated: 1_734_258_600_000,
            },
        ],
        recommendations: vec![
            TaxRecommendation {
                id: "1".into(),
                title: "Maximize 401(k) Contributions".into(),
                category: "deduction".into(),
                potential_savings: 8_500.0,
                implemented: false,
            },
            TaxRecommendation {
                id: "2".into(),
                title: "Accelerate Equipment Depreciation".into(),
                category: "timing".into(),
                potential_savings: 42_000.0,
                implemented: false,
            },
        ],
        compliance_updates: vec![
            ComplianceUpdate {
                id: "1".into(),
                title: "Corporate Tax Rate Update for 2025".into(),
                jurisdiction: "federal".into(),
                status: ComplianceStatus::New,
                action_required: false,
            },
            ComplianceUpdate {
                id: "2".into(),
                title: "Quarterly Estimated Payment Deadline".into(),
                jurisdiction: "state".into(),
                status: ComplianceStatus::New,
                action_required: true,
            },
        ],
        reports: vec![
            ComplianceReport {
                id: "1".into(),
                title: "Q4 2024 Compliance Review".into(),
                period: "Q4 2024".into(),
                assignee: "Sarah Johnson".into(),
                completion_rate: 95.0,
                risk_score: 15.0,
                findings: 2,
                status: ReportStatus::Completed,
                risk_level: RiskLevel::Low,
            },
            ComplianceReport {
                id: "2".into(),
                title: "Annual Transfer Pricing Review".into(),
                period: "FY 2024".into(),
                assignee: "Maria Garcia".into(),
                completion_rate: 40.0,
                risk_score: 45.0,
                findings: 5,
                status: ReportStatus::Pending,
                risk_level: RiskLevel::Medium,
            },
        ],
        audit_trail: vec![AuditEvent {
            id: "1".into(),
            at: 1_734_258_615_000,
            user: "john.smith@company.com".into(),
            action: "Tax Calculation Updated".into(),
            entity: "ABC Corporation".into(),
            details: "Modified deductions from $1,100,000 to $1,150,000".into(),
            category: AuditCategory::Calculation,
        }],
    }
}
