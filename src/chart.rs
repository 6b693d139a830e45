// src/chart.rs
use crate::models::Bar;
use chrono::{Duration, NaiveDate};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use log::warn;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use std::error::Error;
use std::path::Path;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 400;

/// Load the font used for chart text. Without one, charts are drawn
/// without captions or labels.
pub fn load_font(path: &Path) -> Result<(), Box<dyn Error>> {
    let bytes: &'static [u8] = Box::leak(std::fs::read(path)?.into_boxed_slice());
    register_font("sans-serif", FontStyle::Normal, bytes)
        .map_err(|_| format!("{} is not a usable font", path.display()))?;
    Ok(())
}

/// Plot area bounds: x in days since the first bar, y padded 5% around the
/// closes.
#[derive(Debug, Clone, PartialEq)]
struct Bounds {
    start: NaiveDate,
    days: f64,
    low: f64,
    high: f64,
}

fn bounds(bars: &[Bar]) -> Option<Bounds> {
    let first = bars.first()?;
    let last = bars.last()?;
    let (mut low, mut high) = (f64::INFINITY, f64::NEG_INFINITY);
    for bar in bars {
        low = low.min(bar.close);
        high = high.max(bar.close);
    }
    let pad = if high > low { (high - low) * 0.05 } else { 1.0 };
    Some(Bounds {
        start: first.date,
        days: ((last.date - first.date).num_days() as f64).max(1.0),
        low: low - pad,
        high: high + pad,
    })
}

fn points<'a>(bars: &'a [Bar], start: NaiveDate) -> impl Iterator<Item = (f64, f64)> + 'a {
    bars.iter()
        .map(move |b| ((b.date - start).num_days() as f64, b.close))
}

fn draw_labeled(
    buffer: &mut [u8],
    ticker: &str,
    bars: &[Bar],
    b: &Bounds,
) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::with_buffer(buffer, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;

    let start = b.start;
    let mut chart = ChartBuilder::on(&root)
        .caption(format!("{ticker} Stock Price Chart"), ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..b.days, b.low..b.high)?;

    chart
        .configure_mesh()
        .x_desc("Date")
        .y_desc("Price (INR)")
        .x_label_formatter(&|x: &f64| {
            (start + Duration::days(*x as i64)).format("%Y-%m").to_string()
        })
        .y_label_formatter(&|y: &f64| format!("{y:.0}"))
        .draw()?;

    chart
        .draw_series(LineSeries::new(points(bars, start), &BLUE))?
        .label(format!("{ticker} Price"))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Line only, for hosts where no font can be loaded.
fn draw_plain(buffer: &mut [u8], bars: &[Bar], b: &Bounds) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::with_buffer(buffer, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .build_cartesian_2d(0f64..b.days, b.low..b.high)?;
    chart.draw_series(LineSeries::new(points(bars, b.start), &BLUE))?;
    root.present()?;
    Ok(())
}

/// Render a close-price line chart as PNG bytes.
pub fn render_close_chart(ticker: &str, bars: &[Bar]) -> Result<Vec<u8>, Box<dyn Error>> {
    let b = bounds(bars).ok_or("no bars to plot")?;
    let mut buffer = vec![0u8; (WIDTH * HEIGHT * 3) as usize];

    if let Err(e) = draw_labeled(&mut buffer, ticker, bars, &b) {
        warn!("Chart text unavailable for {}, drawing without labels: {}", ticker, e);
        buffer.iter_mut().for_each(|px| *px = 0);
        draw_plain(&mut buffer, bars, &b)?;
    }

    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(&buffer, WIDTH, HEIGHT, ExtendedColorType::Rgb8)?;
    Ok(png)
}
