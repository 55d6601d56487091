use crate::error::{AgriError, AgriResult};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CropCosts {
    pub seed_cost: f64,
    pub fertilizer_cost: f64,
    pub pesticide_cost: f64,
    pub labor_cost: f64,
    pub irrigation_cost: f64,
    pub other_cost: f64,
}

impl CropCosts {
    pub fn total(&self) -> f64 {
        self.seed_cost
            + self.fertilizer_cost
            + self.pesticide_cost
            + self.labor_cost
            + self.irrigation_cost
            + self.other_cost
    }

    fn fields(&self) -> [(&'static str, f64); 6] {
        [
            ("seed_cost", self.seed_cost),
            ("fertilizer_cost", self.fertilizer_cost),
            ("pesticide_cost", self.pesticide_cost),
            ("labor_cost", self.labor_cost),
            ("irrigation_cost", self.irrigation_cost),
            ("other_cost", self.other_cost),
        ]
    }

    /// Every cost line must be non-negative on its own.
    pub fn validate(&self) -> AgriResult<()> {
        match self.fields().iter().find(|(_, v)| *v < 0.0) {
            Some((name, _)) => Err(AgriError::Validation(format!("costs.{} must be non-negative", name))),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CropPerformanceRequest {
    pub crop_name: Option<String>,
    pub area_acres: f64,
    #[serde(default)]
    pub costs: CropCosts,
    pub expected_yield: Option<f64>,
    pub actual_yield: Option<f64>,
    pub yield_unit: Option<String>,
    /// Sale price per yield unit, used for revenue and profit when known.
    pub price_per_unit: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CropPerformance {
    pub crop_name: Option<String>,
    pub area_acres: f64,
    pub costs: CropCosts,
    pub total_investment: f64,
    pub cost_per_acre: f64,
    pub expected_yield: f64,
    pub actual_yield: f64,
    pub yield_unit: String,
    pub yield_achievement_percent: f64,
    pub revenue: Option<f64>,
    pub profit: Option<f64>,
}

fn round_to(v: f64, places: i32) -> f64 {
    let f = 10f64.powi(places);
    (v * f).round() / f
}

pub fn crop_performance(req: &CropPerformanceRequest) -> CropPerformance {
    let total = req.costs.total();
    let cost_per_acre = if req.area_acres > 0.0 { total / req.area_acres } else { 0.0 };
    let expected = req.expected_yield.unwrap_or(0.0);
    let actual = req.actual_yield.unwrap_or(0.0);
    let achievement = if expected > 0.0 && actual > 0.0 {
        actual / expected * 100.0
    } else {
        0.0
    };

    let revenue = req.price_per_unit.filter(|_| actual > 0.0).map(|price| actual * price);

    CropPerformance {
        crop_name: req.crop_name.clone(),
        area_acres: req.area_acres,
        costs: req.costs.clone(),
        total_investment: round_to(total, 2),
        cost_per_acre: round_to(cost_per_acre, 2),
        expected_yield: expected,
        actual_yield: actual,
        yield_unit: req.yield_unit.clone().unwrap_or_else(|| "kg".into()),
        yield_achievement_percent: round_to(achievement, 1),
        revenue: revenue.map(|r| round_to(r, 2)),
        profit: revenue.map(|r| round_to(r - total, 2)),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_type: TransactionType,
    pub category: String,
    pub amount: f64,
    pub transaction_date: NaiveDate,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlyTotals {
    /// YYYY-MM
    pub month: String,
    pub income: f64,
    pub expense: f64,
    pub net: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FinanceSummary {
    pub total_income: f64,
    pub total_expense: f64,
    pub net_profit: f64,
    pub profit_margin: f64,
    pub income_by_category: BTreeMap<String, f64>,
    pub expense_by_category: BTreeMap<String, f64>,
    pub monthly_trend: Vec<MonthlyTotals>,
}

pub fn validate_transactions(transactions: &[Transaction]) -> AgriResult<()> {
    for (i, t) in transactions.iter().enumerate() {
        if !(t.amount > 0.0) {
            return Err(AgriError::Validation(format!("transactions[{}].amount must be greater than 0", i)));
        }
        if t.category.trim().is_empty() {
            return Err(AgriError::Validation(format!("transactions[{}].category is required", i)));
        }
    }
    Ok(())
}

pub fn summarize(transactions: &[Transaction]) -> FinanceSummary {
    let mut income_by_category: BTreeMap<String, f64> = BTreeMap::new();
    let mut expense_by_category: BTreeMap<String, f64> = BTreeMap::new();
    let mut months: BTreeMap<String, (f64, f64)> = BTreeMap::new();

    for t in transactions {
        let month = t.transaction_date.format("%Y-%m").to_string();
        let slot = months.entry(month).or_insert((0.0, 0.0));
        let category = t.category.trim().to_string();
        match t.transaction_type {
            TransactionType::Income => {
                *income_by_category.entry(category).or_insert(0.0) += t.amount;
                slot.0 += t.amount;
            }
            TransactionType::Expense => {
                *expense_by_category.entry(category).or_insert(0.0) += t.amount;
                slot.1 += t.amount;
            }
        }
    }

    let total_income: f64 = income_by_category.values().sum();
    let total_expense: f64 = expense_by_category.values().sum();
    let net = total_income - total_expense;
    let margin = if total_income > 0.0 { net / total_income * 100.0 } else { 0.0 };

    FinanceSummary {
        total_income: round_to(total_income, 2),
        total_expense: round_to(total_expense, 2),
        net_profit: round_to(net, 2),
        profit_margin: round_to(margin, 1),
        income_by_category,
        expense_by_category,
        monthly_trend: months
            .into_iter()
            .map(|(month, (income, expense))| MonthlyTotals {
                month,
                income: round_to(income, 2),
                expense: round_to(expense, 2),
                net: round_to(income - expense, 2),
            })
            .collect(),
    }
}

#[derive(Debug, Deserialize)]
pub struct FinanceSummaryRequest {
    pub transactions: Vec<Transaction>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

pub async fn finance_summary_axum(Json(req): Json<FinanceSummaryRequest>) -> AgriResult<Json<FinanceSummary>> {
    validate_transactions(&req.transactions)?;
    if let (Some(start), Some(end)) = (req.start_date, req.end_date) {
        if start > end {
            return Err(AgriError::Validation("start_date must not be after end_date".into()));
        }
    }

    let in_range: Vec<Transaction> = req
        .transactions
        .into_iter()
        .filter(|t| req.start_date.map_or(true, |s| t.transaction_date >= s))
        .filter(|t| req.end_date.map_or(true, |e| t.transaction_date <= e))
        .collect();

    Ok(Json(summarize(&in_range)))
}

pub async fn crop_performance_axum(Json(req): Json<CropPerformanceRequest>) -> AgriResult<Json<CropPerformance>> {
    if req.area_acres < 0.0 {
        return Err(AgriError::Validation("area_acres must be non-negative".into()));
    }
    req.costs.validate()?;
    if [req.expected_yield, req.actual_yield, req.price_per_unit].iter().flatten().any(|v| *v < 0.0) {
        return Err(AgriError::Validation("yields and prices must be non-negative".into()));
    }
    Ok(Json(crop_performance(&req)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(kind: TransactionType, category: &str, amount: f64, date: &str) -> Transaction {
        Transaction {
            transaction_type: kind,
            category: category.into(),
            amount,
            transaction_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            description: None,
        }
    }

    #[test]
    fn test_crop_performance() {
        let req = CropPerformanceRequest {
            crop_name: Some("Wheat".into()),
            area_acres: 4.0,
            costs: CropCosts {
                seed_cost: 3000.0,
                fertilizer_cost: 5000.0,
                pesticide_cost: 1500.0,
                labor_cost: 8000.0,
                irrigation_cost: 2000.0,
                other_cost: 500.0,
            },
            expected_yield: Some(7200.0),
            actual_yield: Some(6480.0),
            yield_unit: None,
            price_per_unit: Some(22.5),
        };
        let perf = crop_performance(&req);
        assert_eq!(perf.total_investment, 20000.0);
        assert_eq!(perf.cost_per_acre, 5000.0);
        assert_eq!(perf.yield_achievement_percent, 90.0);
        assert_eq!(perf.yield_unit, "kg");
        assert_eq!(perf.revenue, Some(145800.0));
        assert_eq!(perf.profit, Some(125800.0));
    }

    #[test]
    fn test_crop_performance_edge_cases() {
        let req = CropPerformanceRequest {
            crop_name: None,
            area_acres: 0.0,
            costs: CropCosts { seed_cost: 1000.0, ..Default::default() },
            expected_yield: Some(100.0),
            actual_yield: None,
            yield_unit: Some("quintal".into()),
            price_per_unit: Some(2000.0),
        };
        let perf = crop_performance(&req);
        assert_eq!(perf.cost_per_acre, 0.0);
        assert_eq!(perf.yield_achievement_percent, 0.0);
        assert_eq!(perf.revenue, None);
        assert_eq!(perf.profit, None);
    }

    #[test]
    fn test_summary_rollups() {
        let txs = vec![
            tx(TransactionType::Income, "crop_sale", 50000.0, "2024-03-15"),
            tx(TransactionType::Expense, "seeds", 4000.0, "2024-01-10"),
            tx(TransactionType::Expense, "labor", 6000.0, "2024-03-02"),
            tx(TransactionType::Expense, "seeds", 1000.0, "2024-03-20"),
            tx(TransactionType::Income, "subsidy", 5000.0, "2024-01-31"),
        ];
        let s = summarize(&txs);

        assert_eq!(s.total_income, 55000.0);
        assert_eq!(s.total_expense, 11000.0);
        assert_eq!(s.net_profit, 44000.0);
        assert_eq!(s.profit_margin, 80.0);
        assert_eq!(s.expense_by_category.get("seeds"), Some(&5000.0));
        assert_eq!(s.income_by_category.len(), 2);

        let months: Vec<&str> = s.monthly_trend.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(months, vec!["2024-01", "2024-03"]);
        assert_eq!(s.monthly_trend[0].net, 1000.0);
        assert_eq!(s.monthly_trend[1].income, 50000.0);
        assert_eq!(s.monthly_trend[1].expense, 7000.0);
    }

    #[test]
    fn test_summary_without_income_has_zero_margin() {
        let s = summarize(&[tx(TransactionType::Expense, "fuel", 900.0, "2024-05-01")]);
        assert_eq!(s.profit_margin, 0.0);
        assert_eq!(s.net_profit, -900.0);
        assert!(summarize(&[]).monthly_trend.is_empty());
    }

    #[test]
    fn test_transaction_validation() {
        assert!(validate_transactions(&[tx(TransactionType::Income, "sale", 10.0, "2024-01-01")]).is_ok());
        assert!(validate_transactions(&[tx(TransactionType::Income, "sale", 0.0, "2024-01-01")]).is_err());
        assert!(validate_transactions(&[tx(TransactionType::Expense, " ", 5.0, "2024-01-01")]).is_err());
    }

    #[tokio::test]
    async fn test_single_negative_cost_is_rejected() {
        let req: CropPerformanceRequest = serde_json::from_value(serde_json::json!({
            "area_acres": 2.0,
            "costs": { "seed_cost": -1000.0, "fertilizer_cost": 5000.0 }
        }))
        .unwrap();

        match crop_performance_axum(Json(req)).await {
            Err(AgriError::Validation(msg)) => assert_eq!(msg, "costs.seed_cost must be non-negative"),
            other => panic!("expected validation error, got {:?}", other.map(|Json(p)| p.total_investment)),
        }
        assert!(CropCosts { other_cost: 0.0, ..Default::default() }.validate().is_ok());
    }
}
