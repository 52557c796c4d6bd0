//! Financing: eligibility, funding options, loan comparisons,
//! application documents, investor matches and the business plan.

use drift_core::{
    field_rule, CycleError, Delta, DurationWindow, EpochMs, PerturbationRule, RandomSource,
    RuleError, RuleSet, StatusRules, SyncConfig,
};
use drift_engine::{DomainAdapter, MutationContext, SyncStore};
use serde::{Deserialize, Serialize};

use crate::Headline;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreditTier {
    Excellent,
    Good,
    Fair,
    Poor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApprovalOutlook {
    Likely,
    Possible,
    Unlikely,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FundingKind {
    BankLoan,
    GovernmentGrant,
    Microfinance,
    AngelCapital,
    VentureCapital,
    Crowdfunding,
    Cooperative,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentStatus {
    Pending,
    Uploaded,
    Verified,
    Rejected,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Eligibility {
    pub business_name: String,
    pub industry: String,
    pub credit_score: i64,
    pub monthly_revenue: f64,
    pub collateral_value: f64,
    pub months_in_business: i64,
    pub eligibility_score: f64,
    pub credit_tier: CreditTier,
    pub qualified_programs: Vec<String>,
}

/// Partial update of [`Eligibility`]; `None` leaves a field alone.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EligibilityPatch {
    pub business_name: Option<String>,
    pub industry: Option<String>,
    pub months_in_business: Option<i64>,
    pub credit_score: Option<i64>,
    pub monthly_revenue: Option<f64>,
    pub collateral_value: Option<f64>,
    pub eligibility_score: Option<f64>,
    pub qualified_programs: Option<Vec<String>>,
}

impl EligibilityPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FundingOption {
    pub id: String,
    pub name: String,
    pub kind: FundingKind,
    pub provider: String,
    pub min_amount: f64,
    pub max_amount: f64,
    /// Zero for equity products.
    pub interest_rate: f64,
    /// Zero for equity products.
    pub term_months: i64,
    pub processing_days: i64,
}

impl FundingOption {
    pub fn is_equity(&self) -> bool {
        self.term_months == 0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoanComparison {
    pub id: String,
    pub loan_name: String,
    pub provider: String,
    pub amount: f64,
    pub interest_rate: f64,
    pub term_months: i64,
    pub monthly_payment: f64,
    pub total_interest: f64,
    pub processing_days: i64,
    pub approval_odds: f64,
    pub outlook: ApprovalOutlook,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDocument {
    pub id: String,
    pub name: String,
    pub required: bool,
    pub status: DocumentStatus,
    #[serde(default)]
    pub last_updated: Option<EpochMs>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvestorMatch {
    pub id: String,
    pub name: String,
    pub location: String,
    pub min_investment: f64,
    pub max_investment: f64,
    pub match_score: f64,
    pub trust_score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanSection {
    pub title: String,
    pub completed: bool,
    pub word_count: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BusinessPlan {
    pub sections: Vec<PlanSection>,
    pub completion_percentage: f64,
    pub last_updated: EpochMs,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoanData {
    pub eligibility: Eligibility,
    pub funding_options: Vec<FundingOption>,
    pub comparisons: Vec<LoanComparison>,
    pub documents: Vec<ApplicationDocument>,
    pub investors: Vec<InvestorMatch>,
    pub business_plan: BusinessPlan,
}

impl Headline for LoanData {
    fn headline(&self) -> String {
        let best = self
            .comparisons
            .iter()
            .map(|c| c.interest_rate)
            .fold(f64::INFINITY, f64::min);
        format!(
            "credit {} ({:?}), eligibility {:.1}, best rate {:.2}%, plan {:.0}% done",
            self.eligibility.credit_score,
            self.eligibility.credit_tier,
            self.eligibility.eligibility_score,
            best,
            self.business_plan.completion_percentage
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum LoanMutation {
    UpdateEligibility(EligibilityPatch),
    UpdateDocumentStatus {
        doc_id: String,
        status: DocumentStatus,
    },
}

/// Level monthly payment of an amortized loan, and the interest paid
/// over its whole term.
pub fn amortize(amount: f64, annual_rate_pct: f64, term_months: i64) -> Option<(f64, f64)> {
    if term_months <= 0 {
        return None;
    }
    let n = term_months as f64;
    let r = annual_rate_pct / 100.0 / 12.0;
    let payment = if r == 0.0 {
        amount / n
    } else {
        let growth = (1.0 + r).powf(n);
        amount * r * growth / (growth - 1.0)
    };
    let total_interest = payment * n - amount;
    (payment.is_finite() && total_interest.is_finite()).then_some((payment, total_interest))
}

pub struct LoanAdapter {
    eligibility: RuleSet<Eligibility>,
    funding: RuleSet<FundingOption>,
    comparisons: RuleSet<LoanComparison>,
    investors: RuleSet<InvestorMatch>,
    plan: RuleSet<BusinessPlan>,
    credit_tier: StatusRules<Eligibility, CreditTier>,
    outlook: StatusRules<LoanComparison, ApprovalOutlook>,
}

impl LoanAdapter {
    pub fn new() -> Result<Self, RuleError> {
        Ok(Self {
            eligibility: RuleSet::new(vec![
                field_rule!(
                    Eligibility,
                    credit_score,
                    PerturbationRule::new(Delta::steps(5.0)).within(600.0, 850.0)
                ),
                field_rule!(
                    Eligibility,
                    eligibility_score,
                    PerturbationRule::new(Delta::jitter(1.5)).within(50.0, 100.0)
                ),
                field_rule!(
                    Eligibility,
                    monthly_revenue,
                    PerturbationRule::new(Delta::relative(0.025)).floor(0.0)
                ),
            ])?,
            funding: RuleSet::new(vec![
                field_rule!(
                    FundingOption,
                    interest_rate,
                    PerturbationRule::new(Delta::jitter(0.25)).floor(3.0)
                ),
                field_rule!(
                    FundingOption,
                    max_amount,
                    PerturbationRule::new(Delta::relative(0.05)).floor(0.0)
                ),
                field_rule!(
                    FundingOption,
                    processing_days,
                    PerturbationRule::new(Delta::steps(5.0)).floor(7.0)
                ),
            ])?,
            comparisons: RuleSet::new(vec![
                field_rule!(
                    LoanComparison,
                    interest_rate,
                    PerturbationRule::new(Delta::jitter(0.15)).floor(4.0)
                ),
                field_rule!(
                    LoanComparison,
                    approval_odds,
                    PerturbationRule::new(Delta::jitter(2.5)).within(40.0, 95.0)
                ),
            ])?,
            investors: RuleSet::new(vec![
                field_rule!(
                    InvestorMatch,
                    match_score,
                    PerturbationRule::new(Delta::jitter(1.0)).within(60.0, 100.0)
                ),
                field_rule!(
                    InvestorMatch,
                    trust_score,
                    PerturbationRule::new(Delta::jitter(1.0)).within(70.0, 100.0)
                ),
            ])?,
            // Completion only ever grows.
            plan: RuleSet::new(vec![field_rule!(
                BusinessPlan,
                completion_percentage,
                PerturbationRule::new(Delta::Stepped { lo: 0.0, hi: 5.0 }).within(0.0, 100.0)
            )])?,
            credit_tier: StatusRules::<Eligibility, CreditTier>::builder()
                .when(|e: &Eligibility| e.credit_score >= 800, CreditTier::Excellent)
                .when(|e: &Eligibility| e.credit_score >= 740, CreditTier::Good)
                .when(|e: &Eligibility| e.credit_score >= 670, CreditTier::Fair)
                .otherwise(CreditTier::Poor),
            outlook: StatusRules::<LoanComparison, ApprovalOutlook>::builder()
                .when(|c: &LoanComparison| c.approval_odds >= 75.0, ApprovalOutlook::Likely)
                .when(|c: &LoanComparison| c.approval_odds >= 55.0, ApprovalOutlook::Possible)
                .otherwise(ApprovalOutlook::Unlikely),
        })
    }

    /// Replaces the eligibility rules, e.g. with a forced delta.
    pub fn with_eligibility_rules(mut self, eligibility: RuleSet<Eligibility>) -> Self {
        self.eligibility = eligibility;
        self
    }

    fn assign(&self, e: &mut Eligibility, field: &str, value: f64) {
        match self.eligibility.get(field) {
            Some(rule) => rule.assign(e, value),
            None => match field {
                "credit_score" => e.credit_score = value as i64,
                "eligibility_score" => e.eligibility_score = value,
                "monthly_revenue" => e.monthly_revenue = value,
                _ => {}
            },
        }
    }

    fn patch_eligibility(&self, e: &mut Eligibility, patch: &EligibilityPatch) {
        if let Some(name) = &patch.business_name {
            e.business_name = name.clone();
        }
        if let Some(industry) = &patch.industry {
            e.industry = industry.clone();
        }
        if let Some(months) = patch.months_in_business {
            e.months_in_business = months.max(0);
        }
        if let Some(score) = patch.credit_score {
            self.assign(e, "credit_score", score as f64);
        }
        if let Some(score) = patch.eligibility_score {
            self.assign(e, "eligibility_score", score);
        }
        if let Some(revenue) = patch.monthly_revenue {
            self.assign(e, "monthly_revenue", revenue);
        }
        if let Some(collateral) = patch.collateral_value {
            e.collateral_value = collateral.max(0.0);
        }
        if let Some(programs) = &patch.qualified_programs {
            e.qualified_programs = programs.clone();
        }
        e.credit_tier = self.credit_tier.classify(e);
    }
}

impl DomainAdapter for LoanAdapter {
    type Data = LoanData;
    type Mutation = LoanMutation;

    fn name(&self) -> &'static str {
        "loan"
    }

    fn default_config(&self) -> SyncConfig {
        SyncConfig {
            interval: DurationWindow::fixed(40_000),
            latency: DurationWindow::jittered(1_000, 2_000),
            disconnect_after: DurationWindow::jittered(80_000, 120_000),
            reconnect_after: DurationWindow::fixed(4_000),
            failure_rate: 0.0,
        }
    }

    fn initial(&self) -> LoanData {
        seed()
    }

    fn reclassify(&self, data: &mut LoanData) {
        data.eligibility.credit_tier = self.credit_tier.classify(&data.eligibility);
        for c in &mut data.comparisons {
            c.outlook = self.outlook.classify(c);
        }
    }

    fn perturb(
        &self,
        data: &mut LoanData,
        rng: &mut dyn RandomSource,
        now: EpochMs,
    ) -> Result<(), CycleError> {
        self.eligibility.apply(&mut data.eligibility, rng);

        for option in &mut data.funding_options {
            if option.is_equity() {
                // Equity carries no rate; only size and turnaround move.
                let rate = option.interest_rate;
                self.funding.apply(option, rng);
                option.interest_rate = rate;
            } else {
                self.funding.apply(option, rng);
            }
        }

        for loan in &mut data.comparisons {
            self.comparisons.apply(loan, rng);
            let (payment, interest) = amortize(loan.amount, loan.interest_rate, loan.term_months)
                .ok_or_else(|| CycleError::Inconsistent {
                    id: loan.id.clone(),
                    reason: format!("cannot amortize over {} months", loan.term_months),
                })?;
            loan.monthly_payment = payment.round();
            loan.total_interest = interest.round();
        }

        self.investors.apply_all(&mut data.investors, rng);
        self.plan.apply(&mut data.business_plan, rng);
        data.business_plan.last_updated = now;
        Ok(())
    }

    fn apply(&self, data: &mut LoanData, mutation: &LoanMutation, ctx: &MutationContext) -> bool {
        match mutation {
            LoanMutation::UpdateEligibility(patch) => {
                if patch.is_empty() {
                    return false;
                }
                self.patch_eligibility(&mut data.eligibility, patch);
                true
            }
            LoanMutation::UpdateDocumentStatus { doc_id, status } => {
                let Some(doc) = data.documents.iter_mut().find(|d| d.id == *doc_id) else {
                    return false;
                };
                doc.status = *status;
                doc.last_updated = Some(ctx.at);
                true
            }
        }
    }
}

/// Loan edits on a running store.
pub trait LoanActions {
    fn update_eligibility(&self, patch: EligibilityPatch) -> bool;
    fn update_document_status(&self, doc_id: &str, status: DocumentStatus) -> bool;
}

impl LoanActions for SyncStore<LoanAdapter> {
    fn update_eligibility(&self, patch: EligibilityPatch) -> bool {
        self.mutate(LoanMutation::UpdateEligibility(patch))
    }

    fn update_document_status(&self, doc_id: &str, status: DocumentStatus) -> bool {
        self.mutate(LoanMutation::UpdateDocumentStatus {
            doc_id: doc_id.to_string(),
            status,
        })
    }
}

fn seed() -> LoanData {
    LoanData {
        eligibility: Eligibility {
            business_name: "TechStartup Inc".into(),
            industry: "Technology".into(),
            credit_score: 745,
            monthly_revenue: 125_000.0,
            collateral_value: 450_000.0,
            months_in_business: 28,
            eligibility_score: 87.0,
            credit_tier: CreditTier::Good,
            qualified_programs: vec![
                "SBA 7(a) Loan".into(),
                "Business Line of Credit".into(),
                "Equipment Financing".into(),
                "Revenue-Based Financing".into(),
            ],
        },
        funding_options: vec![
            FundingOption {
                id: "1".into(),
                name: "SBA 7(a) General Business Loan".into(),
                kind: FundingKind::GovernmentGrant,
                provider: "U.S. Small Business Administration".into(),
                min_amount: 25_000.0,
                max_amount: 5_000_000.0,
                interest_rate: 6.5,
                term_months: 120,
                processing_days: 45,
            },
            FundingOption {
                id: "2".into(),
                name: "Business Line of Credit".into(),
                kind: FundingKind::BankLoan,
                provider: "First National Bank".into(),
                min_amount: 10_000.0,
                max_amount: 1_000_000.0,
                interest_rate: 8.25,
                term_months: 12,
                processing_days: 14,
            },
            FundingOption {
                id: "3".into(),
                name: "Microfinance Business Loan".into(),
                kind: FundingKind::Microfinance,
                provider: "Community Development Financial Institution".into(),
                min_amount: 500.0,
                max_amount: 50_000.0,
                interest_rate: 12.5,
                term_months: 60,
                processing_days: 21,
            },
            FundingOption {
                id: "4".into(),
                name: "Angel Investment Network".into(),
                kind: FundingKind::AngelCapital,
                provider: "Tech Angels Group".into(),
                min_amount: 25_000.0,
                max_amount: 500_000.0,
                interest_rate: 0.0,
                term_months: 0,
                processing_days: 90,
            },
        ],
        comparisons: vec![
            LoanComparison {
                id: "1".into(),
                loan_name: "SBA 7(a) Loan".into(),
                provider: "First Community Bank".into(),
                amount: 250_000.0,
                interest_rate: 6.5,
                term_months: 120,
                monthly_payment: 2_840.0,
                total_interest: 90_800.0,
                processing_days: 45,
                approval_odds: 78.0,
                outlook: ApprovalOutlook::Likely,
            },
            LoanComparison {
                id: "2".into(),
                loan_name: "Traditional Business Loan".into(),
                provider: "Regional Bank".into(),
                amount: 250_000.0,
                interest_rate: 9.25,
                term_months: 84,
                monthly_payment: 3_580.0,
                total_interest: 116_720.0,
                processing_days: 30,
                approval_odds: 65.0,
                outlook: ApprovalOutlook::Possible,
            },
        ],
        documents: [
            ("1", "Business Plan"),
            ("2", "Financial Statements"),
            ("3", "Tax Returns"),
            ("4", "Bank Statements"),
            ("5", "Credit Report Authorization"),
        ]
        .into_iter()
        .map(|(id, name)| ApplicationDocument {
            id: id.into(),
            name: name.into(),
            required: true,
            status: DocumentStatus::Pending,
            last_updated: None,
        })
        .collect(),
        investors: vec![InvestorMatch {
            id: "1".into(),
            name: "TechVentures Capital".into(),
            location: "San Francisco, CA".into(),
            min_investment: 500_000.0,
            max_investment: 5_000_000.0,
            match_score: 94.0,
            trust_score: 89.0,
        }],
        business_plan: BusinessPlan {
            sections: vec![
                PlanSection {
                    title: "Executive Summary".into(),
                    completed: true,
                    word_count: 450,
                },
                PlanSection {
                    title: "Market Analysis".into(),
                    completed: true,
                    word_count: 680,
                },
                PlanSection {
                    title: "Financial Projections".into(),
                    completed: false,
                    word_count: 0,
                },
            ],
            completion_percentage: 67.0,
            last_updated: 1_733_841_000_000,
        },
    }
}
