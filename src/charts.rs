use crate::estimator::RatioEstimate;
use crate::logger::sanitize_filename;
use plotters::prelude::*;
use std::error::Error;
use std::fs;

const CHARTS_DIR: &str = "charts";
const MIN_BINS: usize = 5;
const MAX_BINS: usize = 30;

/// Equal-width revenue bins spanning the lowest trial revenue up to the offline optimum
#[derive(Debug)]
struct RevenueBins {
    low: f64,
    high: f64,
    counts: Vec<u32>,
}

impl RevenueBins {
    /// `revenues` must not be empty
    fn new(revenues: &[f64], optimal_revenue: f64) -> Self {
        let mut low = revenues.iter().cloned().fold(f64::INFINITY, f64::min);
        let mut high = revenues.iter().cloned().fold(optimal_revenue, f64::max);
        // All trials at the optimum leaves nothing to span
        if high - low < f64::EPSILON {
            low -= 0.5;
            high += 0.5;
        }

        let num_bins = ((revenues.len() as f64).sqrt().ceil() as usize).clamp(MIN_BINS, MAX_BINS);
        let width = (high - low) / num_bins as f64;
        let mut counts = vec![0u32; num_bins];
        for &revenue in revenues {
            let index = ((revenue - low) / width).floor() as usize;
            counts[index.min(num_bins - 1)] += 1;
        }
        Self { low, high, counts }
    }

    fn width(&self) -> f64 {
        (self.high - self.low) / self.counts.len() as f64
    }

    fn max_count(&self) -> u32 {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

/// Histogram of per-trial revenue for one strategy with the mean and the offline optimum marked
pub fn generate_trial_revenue_histogram(strategy_name: &str, estimate: &RatioEstimate) -> Result<String, Box<dyn Error>> {
    if estimate.trial_revenues.is_empty() {
        return Err("Cannot create histogram: no trials".into());
    }
    fs::create_dir_all(CHARTS_DIR)?;
    let filename = format!("{}/{}_trial_revenue.png", CHARTS_DIR, sanitize_filename(strategy_name));
    let bins = RevenueBins::new(&estimate.trial_revenues, estimate.optimal_revenue);
    let y_top = bins.max_count() + bins.max_count() / 10 + 1;
    let title = format!("{}: revenue over {} trials (ratio {:.4})",
        strategy_name, estimate.trial_revenues.len(), estimate.ratio);

    {
        let root = BitMapBackend::new(&filename, (800, 600)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&title, ("sans-serif", 24))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(bins.low..bins.high, 0u32..y_top)?;

        chart.configure_mesh()
            .x_desc("Revenue")
            .y_desc("Trials")
            .draw()?;

        let width = bins.width();
        chart.draw_series(bins.counts.iter().enumerate().map(|(i, &count)| {
            let x0 = bins.low + i as f64 * width;
            Rectangle::new([(x0, 0), (x0 + width, count)], BLUE.filled())
        }))?
        .label(format!("Trials (n={})", estimate.trial_revenues.len()))
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], BLUE.filled()));

        chart.draw_series(std::iter::once(PathElement::new(
            vec![(estimate.mean_revenue, 0), (estimate.mean_revenue, y_top)],
            &BLACK,
        )))?
        .label(format!("Mean: {:.2}", estimate.mean_revenue))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLACK));

        chart.draw_series(std::iter::once(PathElement::new(
            vec![(estimate.optimal_revenue, 0), (estimate.optimal_revenue, y_top)],
            &RED,
        )))?
        .label(format!("Sum of budgets: {:.2}", estimate.optimal_revenue))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));

        chart.configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;

        root.present()?;
    }
    Ok(filename)
}

/// Bar chart of competitive ratios, one bar per strategy
pub fn generate_strategy_comparison_chart(ratios: &[(&str, f64)]) -> Result<String, Box<dyn Error>> {
    if ratios.is_empty() {
        return Err("Cannot create comparison chart: no strategies".into());
    }
    fs::create_dir_all(CHARTS_DIR)?;
    let filename = format!("{}/strategy_comparison.png", CHARTS_DIR);
    let labels: Vec<String> = ratios.iter().map(|(name, _)| name.to_string()).collect();

    {
        let root = BitMapBackend::new(&filename, (800, 600)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Competitive ratio by strategy", ("sans-serif", 30))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(0f64..ratios.len() as f64, 0f64..1.0f64)?;

        chart.configure_mesh()
            .disable_x_mesh()
            .x_labels(ratios.len() + 1)
            .x_label_formatter(&|x| {
                let index = x.floor() as usize;
                labels.get(index).cloned().unwrap_or_default()
            })
            .y_desc("Competitive ratio")
            .draw()?;

        chart.draw_series(ratios.iter().enumerate().map(|(i, (_, ratio))| {
            Rectangle::new([(i as f64 + 0.2, 0.0), (i as f64 + 0.8, *ratio)], GREEN.filled())
        }))?;

        chart.draw_series(ratios.iter().enumerate().map(|(i, (_, ratio))| {
            Text::new(format!("{:.4}", ratio), (i as f64 + 0.35, (ratio + 0.03).min(0.97)), ("sans-serif", 18).into_font())
        }))?;

        root.present()?;
    }
    Ok(filename)
}
