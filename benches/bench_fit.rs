use chrono::{Days, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use outbreak_rs::optimizer::{fit, FitMethod};
use outbreak_rs::search::OrderGrid;
use outbreak_rs::types::{SarimaxConfig, SarimaxOrder};
use outbreak_rs::{ForecastConfig, Forecaster, NoopObserver, SeasonalForecaster, TimeSeries};

fn weekly_cases(n: usize) -> Vec<f64> {
    (0..n)
        .map(|t| {
            let weekday = [1.0, 1.1, 1.05, 1.0, 0.95, 0.7, 0.6][t % 7];
            let wobble = ((t * 37 % 11) as f64 - 5.0) * 3.0;
            (200.0 + 2.0 * t as f64) * weekday + wobble
        })
        .collect()
}

fn bench_fit(c: &mut Criterion) {
    let values = weekly_cases(120);
    let log_values: Vec<f64> = values.iter().map(|v| v.ln_1p()).collect();

    let cfg = SarimaxConfig::new(SarimaxOrder::new(1, 1, 1, 1, 0, 1, 7));
    c.bench_function("fit (1,1,1)x(1,0,1,7)", |b| {
        b.iter(|| fit(black_box(&log_values), &cfg, FitMethod::Lbfgs, 200).unwrap())
    });

    let start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
    let dates = (0..values.len() as u64)
        .map(|i| start.checked_add_days(Days::new(i)).unwrap())
        .collect();
    let series = TimeSeries::new(dates, values).unwrap();
    let config = ForecastConfig {
        grid: OrderGrid {
            p: vec![0, 1, 2],
            d: vec![0, 1],
            q: vec![0, 1, 2],
            pp: vec![0, 1],
            dd: vec![0],
            qq: vec![0, 1],
        },
        ..ForecastConfig::default()
    };
    let forecaster = SeasonalForecaster::from_config(config).with_observer(std::sync::Arc::new(NoopObserver));

    let mut group = c.benchmark_group("search");
    group.sample_size(10);
    group.bench_function("72 candidates, 14-day horizon", |b| {
        b.iter(|| forecaster.forecast(black_box(&series), 14).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_fit);
criterion_main!(benches);
