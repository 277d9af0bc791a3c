//! Daily prices through monthly CAPM regressions to beta-sorted portfolios.

use approx::assert_relative_eq;
use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use saigon_data::{PriceRecord, RiskFreeRecord};
use saigon_factors::calendar::business_days;
use saigon_factors::{
    AGGRESSIVE, CapmEstimator, CapmSample, MissingMemberPolicy, Panel, PortfolioBacktest,
    PortfolioConfig, PriceField, STABLE, monthly_returns, monthly_risk_free,
};

const BETAS: [(&str, f64); 3] = [("HPG", 1.5), ("VNM", 0.4), ("FPT", 0.7)];

fn record(date: NaiveDate, ticker: &str, close: f64) -> PriceRecord {
    PriceRecord {
        date,
        ticker: ticker.to_string(),
        close,
        adj_close: close,
        open: close,
        high: close,
        low: close,
        volume: 1_000.0,
    }
}

struct Market {
    stocks: Vec<PriceRecord>,
    index: Vec<PriceRecord>,
    rates: Vec<RiskFreeRecord>,
}

fn simulate(seed: u64) -> Market {
    let mut rng = StdRng::seed_from_u64(seed);
    let days = business_days(
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2022, 12, 30).unwrap(),
    );

    let mut index_level = 1_000.0;
    let mut levels: Vec<f64> = vec![50.0; BETAS.len()];
    let mut stocks = Vec::new();
    let mut index = Vec::new();
    let mut rates = Vec::new();

    for day in days {
        let market: f64 = rng.gen_range(-0.02..0.02) + 0.0003;
        index_level *= 1.0 + market;
        index.push(record(day, "VNINDEX", index_level));

        for ((ticker, beta), level) in BETAS.iter().zip(levels.iter_mut()) {
            let noise: f64 = rng.gen_range(-0.002..0.002);
            *level *= 1.0 + beta * market + noise;
            stocks.push(record(day, ticker, *level));
        }

        if day.day() == 15 {
            rates.push(RiskFreeRecord { date: day, rate: 0.04 });
        }
    }
    Market {
        stocks,
        index,
        rates,
    }
}

fn sample(market: &Market) -> CapmSample {
    let returns = Panel::from_records(&market.stocks, PriceField::Close)
        .and_then(|p| monthly_returns(&p))
        .unwrap();
    let benchmark = Panel::from_records(&market.index, PriceField::Close)
        .and_then(|p| monthly_returns(&p))
        .unwrap();
    CapmSample::align(
        &returns,
        &benchmark,
        "VNINDEX",
        &monthly_risk_free(&market.rates),
    )
    .unwrap()
}

#[test]
fn test_betas_recovered_from_daily_prices() {
    let market = simulate(11);
    let sample = sample(&market);
    assert!(sample.dates.len() > 20);

    let results = CapmEstimator::new().estimate(&sample);
    assert_eq!(results.len(), BETAS.len());
    for (ticker, beta) in BETAS {
        let result = results.iter().find(|r| r.ticker == ticker).unwrap();
        assert_relative_eq!(result.beta, beta, epsilon = 0.15);
        assert!(result.r_squared > 0.8);
        assert_eq!(result.nobs, sample.dates.len());
    }
}

#[test]
fn test_portfolios_split_on_beta() {
    let market = simulate(23);
    let sample = sample(&market);
    let results = CapmEstimator::new().estimate(&sample);

    let backtest = PortfolioBacktest::with_config(PortfolioConfig {
        missing: MissingMemberPolicy::DropPeriod,
        ..PortfolioConfig::default()
    });
    let performances = backtest
        .run(&sample.returns, &results, sample.mean_risk_free())
        .unwrap();

    let names: Vec<&str> = performances
        .iter()
        .map(|p| p.portfolio.name.as_str())
        .collect();
    assert_eq!(names, [AGGRESSIVE, STABLE]);
    assert_eq!(performances[0].portfolio.tickers, ["HPG"]);
    assert_eq!(performances[1].portfolio.tickers, ["FPT", "VNM"]);

    for performance in &performances {
        assert_eq!(performance.returns.len(), sample.dates.len());
        let total = performance.cumulative.last().copied().unwrap() - 1.0;
        assert_relative_eq!(performance.metrics.total_return, total, epsilon = 1e-12);
        assert!(performance.metrics.volatility > 0.0);
        assert!(performance.metrics.max_drawdown <= 0.0);
    }
    assert!(performances[0].metrics.volatility > performances[1].metrics.volatility);
}
