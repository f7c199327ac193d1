use fscore_core::{FundamentalsRecord, MetricPair, PolicyOptions, SignalVector};

/// Division that yields 0 instead of inf/NaN when the denominator is zero
fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Ratio of two metrics for (current, previous) periods
fn ratio(numerator: MetricPair, denominator: MetricPair) -> (f64, f64) {
    (
        safe_div(numerator.current, denominator.current),
        safe_div(numerator.previous, denominator.previous),
    )
}

/// Maps a resolved record onto the nine scoring criteria. Stateless.
pub struct SignalDeriver;

impl SignalDeriver {
    pub fn new() -> Self {
        Self
    }

    pub fn derive(&self, record: &FundamentalsRecord, options: &PolicyOptions) -> SignalVector {
        let (roa_cur, roa_prev) = ratio(record.net_income, record.total_assets);

        SignalVector {
            roa_positive: roa_cur > 0.0,
            cfo_positive: record.cash_flow_from_ops.current > 0.0,
            roa_improved: roa_cur > roa_prev,
            accrual_positive: record.cash_flow_from_ops.current > record.net_income.current,
            leverage_decreased: self.leverage_decreased(record, options),
            current_ratio_improved: {
                let (cur, prev) = ratio(record.current_assets, record.current_liabilities);
                cur > prev
            },
            no_new_shares: self.no_new_shares(record.shares_outstanding, options),
            gross_margin_improved: {
                let gross = MetricPair::new(
                    record.revenue.current - record.cost_of_goods_sold.current,
                    record.revenue.previous - record.cost_of_goods_sold.previous,
                );
                let (cur, prev) = ratio(gross, record.revenue);
                cur > prev
            },
            asset_turnover_improved: match options.asset_turnover_override {
                Some(forced) => forced,
                None => {
                    let (cur, prev) = ratio(record.revenue, record.total_assets);
                    cur > prev
                }
            },
        }
    }

    fn leverage_decreased(&self, record: &FundamentalsRecord, options: &PolicyOptions) -> bool {
        if options.leverage_uses_ratio {
            let (cur, prev) = ratio(record.long_term_debt, record.total_assets);
            cur < prev
        } else {
            record.long_term_debt.current < record.long_term_debt.previous
        }
    }

    // Tolerance branch is inclusive: an increase equal to the tolerance still passes.
    fn no_new_shares(&self, shares: MetricPair, options: &PolicyOptions) -> bool {
        let delta = shares.current - shares.previous;
        delta <= 0.0 || safe_div(delta, shares.previous) <= options.share_dilution_tolerance
    }
}

impl Default for SignalDeriver {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ScoreAggregator;

impl ScoreAggregator {
    /// Number of true signals, 0..=9
    pub fn score(signals: &SignalVector) -> u8 {
        signals.iter().filter(|(_, passed)| *passed).count() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fscore_core::{PartialFundamentals, PartialPair, SignalName, SourceKind};

    fn record(pairs: [(f64, f64); 9]) -> FundamentalsRecord {
        let mut partial = PartialFundamentals::default();
        for (metric, (cur, prev)) in fscore_core::Metric::ALL.into_iter().zip(pairs) {
            *partial.get_mut(metric) = PartialPair {
                current: Some(cur),
                previous: Some(prev),
            };
        }
        partial.complete(SourceKind::Hardcoded, None)
    }

    // revenue, net_income, cfo, assets, debt, current assets, current liabilities, cogs, shares
    fn perfect_company() -> FundamentalsRecord {
        record([
            (1000.0, 800.0),
            (100.0, 60.0),
            (120.0, 70.0),
            (1200.0, 1200.0),
            (200.0, 300.0),
            (800.0, 600.0),
            (200.0, 250.0),
            (400.0, 450.0),
            (100.0, 100.0),
        ])
    }

    fn terrible_company() -> FundamentalsRecord {
        record([
            (500.0, 800.0),
            (-50.0, -30.0),
            (-60.0, -20.0),
            (900.0, 1000.0),
            (400.0, 300.0),
            (300.0, 500.0),
            (400.0, 300.0),
            (450.0, 400.0),
            (120.0, 100.0),
        ])
    }

    #[test]
    fn test_perfect_company_scores_nine() {
        let signals = SignalDeriver::new().derive(&perfect_company(), &PolicyOptions::default());
        assert!(signals.iter().all(|(_, passed)| passed), "{:?}", signals);
        assert_eq!(ScoreAggregator::score(&signals), 9);
    }

    #[test]
    fn test_terrible_company_scores_zero() {
        let signals = SignalDeriver::new().derive(&terrible_company(), &PolicyOptions::default());
        assert_eq!(ScoreAggregator::score(&signals), 0, "{:?}", signals);
    }

    #[test]
    fn test_asset_turnover_override_flips_only_signal_nine() {
        let mut rec = perfect_company();
        rec.total_assets = MetricPair::new(1500.0, 1000.0);
        rec.revenue = MetricPair::new(1000.0, 900.0);
        let deriver = SignalDeriver::new();

        let computed = deriver.derive(&rec, &PolicyOptions::default());
        let forced = deriver.derive(
            &rec,
            &PolicyOptions {
                asset_turnover_override: Some(true),
                ..Default::default()
            },
        );

        assert!(!computed.asset_turnover_improved);
        assert!(forced.asset_turnover_improved);
        assert_eq!(ScoreAggregator::score(&forced) - ScoreAggregator::score(&computed), 1);
        for name in SignalName::ALL {
            if name != SignalName::AssetTurnoverImproved {
                assert_eq!(computed.get(name), forced.get(name), "{}", name.as_str());
            }
        }
    }

    #[test]
    fn test_derive_is_deterministic() {
        let deriver = SignalDeriver::new();
        let options = PolicyOptions {
            share_dilution_tolerance: 0.05,
            ..Default::default()
        };
        for rec in [perfect_company(), terrible_company()] {
            assert_eq!(deriver.derive(&rec, &options), deriver.derive(&rec, &options));
        }
    }

    #[test]
    fn test_all_zero_record_is_total() {
        let signals = SignalDeriver::new().derive(&record([(0.0, 0.0); 9]), &PolicyOptions::default());
        // Zero denominators collapse to 0, and ties never count as improvement
        assert!(!signals.roa_positive);
        assert!(!signals.roa_improved);
        assert!(!signals.gross_margin_improved);
        assert!(!signals.asset_turnover_improved);
        assert!(!signals.current_ratio_improved);
        assert!(!signals.leverage_decreased);
        assert!(signals.no_new_shares);
        assert_eq!(ScoreAggregator::score(&signals), 1);
    }

    #[test]
    fn test_leverage_modes_can_disagree() {
        let mut rec = perfect_company();
        // Debt rises in absolute terms but falls relative to a larger balance sheet
        rec.long_term_debt = MetricPair::new(320.0, 300.0);
        rec.total_assets = MetricPair::new(2400.0, 1200.0);
        let deriver = SignalDeriver::new();

        let by_ratio = deriver.derive(&rec, &PolicyOptions::default());
        let by_level = deriver.derive(
            &rec,
            &PolicyOptions {
                leverage_uses_ratio: false,
                ..Default::default()
            },
        );
        assert!(by_ratio.leverage_decreased);
        assert!(!by_level.leverage_decreased);
    }

    #[test]
    fn test_dilution_tolerance_is_inclusive() {
        let mut rec = perfect_company();
        rec.shares_outstanding = MetricPair::new(105.0, 100.0);
        let deriver = SignalDeriver::new();

        let strict = deriver.derive(&rec, &PolicyOptions::default());
        let at_limit = deriver.derive(
            &rec,
            &PolicyOptions {
                share_dilution_tolerance: 0.05,
                ..Default::default()
            },
        );
        let below_limit = deriver.derive(
            &rec,
            &PolicyOptions {
                share_dilution_tolerance: 0.04,
                ..Default::default()
            },
        );
        assert!(!strict.no_new_shares);
        assert!(at_limit.no_new_shares);
        assert!(!below_limit.no_new_shares);
    }

    #[test]
    fn test_score_range() {
        assert_eq!(ScoreAggregator::score(&SignalVector::default()), 0);
        let all = SignalVector {
            roa_positive: true,
            cfo_positive: true,
            roa_improved: true,
            accrual_positive: true,
            leverage_decreased: true,
            current_ratio_improved: true,
            no_new_shares: true,
            gross_margin_improved: true,
            asset_turnover_improved: true,
        };
        assert_eq!(ScoreAggregator::score(&all), 9);
    }
}
