// Views for the Transit Delay Analysis dashboard: egui section renderers over
// the record set and the computed aggregates. Everything here is read-only;
// state lives in the app, computation lives in the controllers.
use crate::tda_controllers::{Prediction, RouteComparison, SummaryStats};
use crate::tda_models::{DelayCategory, TdaModels, VehicleRecord};
use egui::{Color32, FontId, Pos2, Rect, RichText, Sense, Stroke, Ui, Vec2};
use egui_extras::{Column, TableBuilder};
use geo::Centroid;
use geo_types::{MultiPoint, Point};
use lazy_static::lazy_static;
use std::collections::HashMap;

// ============================================================================
// Category Palette
// ============================================================================

lazy_static! {
    static ref CATEGORY_COLORS: HashMap<&'static str, Color32> = {
        let mut colors = HashMap::new();
        colors.insert("On Time", Color32::from_rgb(0, 160, 0));
        colors.insert("Low Delay", Color32::from_rgb(144, 238, 144));
        colors.insert("Moderate Delay", Color32::from_rgb(255, 165, 0));
        colors.insert("High Delay", Color32::from_rgb(220, 40, 40));
        colors
    };
}

/// Unknown labels fall back to gray.
pub fn category_color(label: &str) -> Color32 {
    CATEGORY_COLORS
        .get(label)
        .copied()
        .unwrap_or(Color32::from_rgb(128, 128, 128))
}

// ============================================================================
// Map Projection Helpers
// ============================================================================

/// Geographic centroid of the record positions, as (longitude, latitude).
pub fn map_center(records: &[VehicleRecord]) -> Option<(f64, f64)> {
    let points: Vec<Point<f64>> = records
        .iter()
        .map(|r| Point::new(r.longitude, r.latitude))
        .collect();
    MultiPoint::from(points).centroid().map(|c| (c.x(), c.y()))
}

/// Largest deviation from the center on each axis, floored so a single
/// vehicle still gets a visible frame around it.
pub fn map_half_spans(records: &[VehicleRecord], center: (f64, f64)) -> (f64, f64) {
    const MIN_HALF_SPAN: f64 = 0.01;
    let mut half_lon = MIN_HALF_SPAN;
    let mut half_lat = MIN_HALF_SPAN;
    for record in records {
        half_lon = half_lon.max((record.longitude - center.0).abs());
        half_lat = half_lat.max((record.latitude - center.1).abs());
    }
    (half_lon, half_lat)
}

fn project(
    lon: f64,
    lat: f64,
    center: (f64, f64),
    half_spans: (f64, f64),
    canvas: Rect,
) -> Pos2 {
    let margin = 16.0;
    let usable_w = f64::from(canvas.width() - 2.0 * margin);
    let usable_h = f64::from(canvas.height() - 2.0 * margin);

    let fx = (lon - center.0 + half_spans.0) / (2.0 * half_spans.0);
    let fy = (lat - center.1 + half_spans.1) / (2.0 * half_spans.1);

    Pos2::new(
        canvas.left() + margin + (fx * usable_w) as f32,
        // Latitude grows north, screen y grows down.
        canvas.bottom() - margin - (fy * usable_h) as f32,
    )
}

// ============================================================================
// Section Renderers
// ============================================================================

pub struct TdaViews;

impl TdaViews {
    // ------------------------------------------------------------------------
    // Summary tiles
    // ------------------------------------------------------------------------

    pub fn show_summary_tiles(ui: &mut Ui, stats: &SummaryStats) {
        ui.horizontal_wrapped(|ui| {
            Self::tile(ui, "🚌 Vehicles", &stats.total_vehicles.to_string());
            Self::tile(ui, "🛤 Routes", &stats.unique_routes.to_string());
            Self::tile(
                ui,
                "⏱ Avg delay (simulated)",
                &format!("{:.2} min", stats.mean_delay),
            );
            Self::tile(ui, "🟢 On Time", &stats.on_time.to_string());
            Self::tile(ui, "🔴 High Delay", &stats.high_delay.to_string());
            Self::tile(
                ui,
                "⬆ Most delayed",
                stats.most_delayed.as_deref().unwrap_or("-"),
            );
            Self::tile(
                ui,
                "⬇ Least delayed",
                stats.least_delayed.as_deref().unwrap_or("-"),
            );
        });
    }

    fn tile(ui: &mut Ui, title: &str, value: &str) {
        egui::Frame::group(ui.style()).show(ui, |ui| {
            ui.vertical(|ui| {
                ui.label(title);
                ui.label(RichText::new(value).size(18.0).strong());
            });
        });
    }

    // ------------------------------------------------------------------------
    // Vehicle table
    // ------------------------------------------------------------------------

    pub fn show_vehicle_table(ui: &mut Ui, records: &[VehicleRecord]) {
        if records.is_empty() {
            ui.label("No vehicles match the current filters.");
            return;
        }

        TableBuilder::new(ui)
            .striped(true)
            .resizable(true)
            .column(Column::auto().at_least(80.0))
            .column(Column::auto().at_least(60.0))
            .column(Column::auto().at_least(80.0))
            .column(Column::auto().at_least(80.0))
            .column(Column::auto().at_least(110.0))
            .column(Column::auto().at_least(140.0))
            .column(Column::auto().at_least(60.0))
            .column(Column::remainder())
            .header(20.0, |mut header| {
                header.col(|ui| {
                    ui.strong("Vehicle ID");
                });
                header.col(|ui| {
                    ui.strong("Route");
                });
                header.col(|ui| {
                    ui.strong("Latitude");
                });
                header.col(|ui| {
                    ui.strong("Longitude");
                });
                header.col(|ui| {
                    ui.strong("Status");
                });
                header.col(|ui| {
                    ui.strong("Updated At");
                });
                header.col(|ui| {
                    ui.strong("Delay");
                });
                header.col(|ui| {
                    ui.strong("Category");
                });
            })
            .body(|body| {
                body.rows(18.0, records.len(), |mut row| {
                    let record = &records[row.index()];
                    row.col(|ui| {
                        ui.label(&record.vehicle_id);
                    });
                    row.col(|ui| {
                        ui.label(&record.route);
                    });
                    row.col(|ui| {
                        ui.label(format!("{:.5}", record.latitude));
                    });
                    row.col(|ui| {
                        ui.label(format!("{:.5}", record.longitude));
                    });
                    row.col(|ui| {
                        ui.label(&record.status);
                    });
                    row.col(|ui| {
                        ui.label(TdaModels::format_updated_at(&record.updated_at));
                    });
                    row.col(|ui| {
                        ui.label(format!("{} min", record.delay_minutes));
                    });
                    row.col(|ui| {
                        let label = record.delay_category.label();
                        ui.colored_label(category_color(label), label);
                    });
                });
            });
    }

    // ------------------------------------------------------------------------
    // Delay map
    // ------------------------------------------------------------------------

    pub fn show_map(ui: &mut Ui, records: &[VehicleRecord]) {
        let Some(center) = map_center(records) else {
            ui.label("No data to show on the map for the current filters.");
            return;
        };
        let half_spans = map_half_spans(records, center);

        let width = ui.available_width().max(200.0);
        let (response, painter) = ui.allocate_painter(Vec2::new(width, 360.0), Sense::hover());
        let canvas = response.rect;

        painter.rect_filled(canvas, 4.0, Color32::from_rgb(28, 32, 38));
        painter.rect_stroke(canvas, 4.0, Stroke::new(1.0, Color32::from_gray(90)));

        let markers: Vec<(Pos2, &VehicleRecord)> = records
            .iter()
            .map(|record| {
                let pos = project(record.longitude, record.latitude, center, half_spans, canvas);
                (pos, record)
            })
            .collect();

        for (pos, record) in &markers {
            painter.circle_filled(*pos, 4.0, category_color(record.delay_category.label()));
        }

        let mut tooltip = None;
        if let Some(hover) = response.hover_pos() {
            for (pos, record) in &markers {
                if pos.distance(hover) <= 6.0 {
                    tooltip = Some(format!(
                        "Bus {} - Route {} - Delay: {} min",
                        record.vehicle_id, record.route, record.delay_minutes
                    ));
                    break;
                }
            }
        }
        if let Some(text) = tooltip {
            response.on_hover_text(text);
        }

        ui.add_space(5.0);
        egui::Frame::group(ui.style()).show(ui, |ui| {
            ui.horizontal_wrapped(|ui| {
                ui.label("Legend:");
                for category in DelayCategory::ALL {
                    let label = category.label();
                    ui.colored_label(category_color(label), "●");
                    ui.label(label);
                }
            });
        });
    }

    // ------------------------------------------------------------------------
    // Per-route comparison chart
    // ------------------------------------------------------------------------

    pub fn show_route_comparison(ui: &mut Ui, comparison: &RouteComparison) {
        match comparison {
            RouteComparison::NoSelection => {
                ui.label("Select a route filter to compare its vehicles.");
            }
            RouteComparison::NothingToCompare { route } => {
                ui.label(format!(
                    "Only one vehicle reported on route {}, nothing to compare.",
                    route
                ));
            }
            RouteComparison::Ranked { route, vehicles } => {
                ui.strong(format!("Vehicles on route {} by simulated delay", route));
                ui.add_space(5.0);

                let bar_color = Color32::from_rgb(250, 128, 114);
                let max_bar_width = (ui.available_width() - 180.0).max(80.0);
                for (vehicle_id, delay) in vehicles {
                    ui.horizontal(|ui| {
                        ui.add_sized(
                            Vec2::new(110.0, 16.0),
                            egui::Label::new(RichText::new(vehicle_id).monospace()),
                        );
                        let frac = f32::from(*delay) / 6.0;
                        let bar_width = (frac * max_bar_width).max(2.0);
                        let (bar_response, bar_painter) =
                            ui.allocate_painter(Vec2::new(bar_width, 14.0), Sense::hover());
                        bar_painter.rect_filled(bar_response.rect, 2.0, bar_color);
                        ui.label(format!("{} min", delay));
                    });
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // All-routes average chart
    // ------------------------------------------------------------------------

    pub fn show_route_averages(ui: &mut Ui, averages: &[(String, f64)]) {
        if averages.is_empty() {
            ui.label("No route data yet.");
            return;
        }

        let width = ui.available_width().max(200.0);
        let (response, painter) = ui.allocate_painter(Vec2::new(width, 220.0), Sense::hover());
        let canvas = response.rect;

        painter.rect_filled(canvas, 4.0, Color32::from_rgb(28, 32, 38));
        painter.rect_stroke(canvas, 4.0, Stroke::new(1.0, Color32::from_gray(90)));

        let max_avg = averages
            .iter()
            .map(|(_, avg)| *avg)
            .fold(0.0_f64, f64::max)
            .max(1.0);

        let margin = 12.0;
        let label_band = 18.0;
        let plot_height = canvas.height() - 2.0 * margin - label_band;
        let slot_width = (canvas.width() - 2.0 * margin) / averages.len() as f32;
        let bar_width = (slot_width * 0.7).min(48.0);
        let bar_color = Color32::from_rgb(100, 149, 237);

        let hover = response.hover_pos();
        let mut tooltip = None;

        for (i, (route, avg)) in averages.iter().enumerate() {
            let slot_left = canvas.left() + margin + i as f32 * slot_width;
            let bar_left = slot_left + (slot_width - bar_width) / 2.0;
            let bar_height = ((avg / max_avg) as f32 * plot_height).max(2.0);
            let bar_top = canvas.bottom() - margin - label_band - bar_height;
            let bar = Rect::from_min_size(
                Pos2::new(bar_left, bar_top),
                Vec2::new(bar_width, bar_height),
            );
            painter.rect_filled(bar, 2.0, bar_color);

            painter.text(
                Pos2::new(bar.center().x, bar.top() - 2.0),
                egui::Align2::CENTER_BOTTOM,
                format!("{:.1}", avg),
                FontId::proportional(10.0),
                Color32::from_gray(200),
            );
            painter.text(
                Pos2::new(bar.center().x, canvas.bottom() - margin),
                egui::Align2::CENTER_BOTTOM,
                route,
                FontId::proportional(10.0),
                Color32::from_gray(200),
            );

            if let Some(pos) = hover {
                if bar.contains(pos) {
                    tooltip = Some(format!("Route {}: {:.2} min average", route, avg));
                }
            }
        }

        if let Some(text) = tooltip {
            response.on_hover_text(text);
        }
    }

    // ------------------------------------------------------------------------
    // Prediction panel
    // ------------------------------------------------------------------------

    pub fn show_prediction(ui: &mut Ui, route: &str, prediction: &Prediction) {
        match prediction {
            Prediction::NoData => {
                ui.colored_label(
                    Color32::from_rgb(255, 165, 0),
                    format!("No data available for route {}.", route),
                );
            }
            Prediction::Best {
                hour,
                vehicle_id,
                delay_minutes,
            } => {
                let green = Color32::from_rgb(0, 160, 0);
                ui.colored_label(
                    green,
                    format!("Best hour to travel on route {}: {:02}:00", route, hour),
                );
                ui.colored_label(
                    green,
                    format!(
                        "Best vehicle: {} ({} min simulated delay)",
                        vehicle_id, delay_minutes
                    ),
                );
                ui.label("Based on the simulated delays of the current snapshot.");
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn rec(vehicle_id: &str, lat: f64, lon: f64) -> VehicleRecord {
        VehicleRecord::new(
            vehicle_id.to_string(),
            "Red".to_string(),
            lat,
            lon,
            "IN_TRANSIT_TO".to_string(),
            DateTime::parse_from_rfc3339("2026-08-06T08:15:00-04:00").unwrap(),
            3,
        )
    }

    #[test]
    fn test_category_color_known_labels() {
        for category in DelayCategory::ALL {
            let color = category_color(category.label());
            assert_ne!(color, Color32::from_rgb(128, 128, 128));
        }
    }

    #[test]
    fn test_category_color_unknown_label_is_gray() {
        assert_eq!(
            category_color("Severe Delay"),
            Color32::from_rgb(128, 128, 128)
        );
    }

    #[test]
    fn test_map_center_is_centroid() {
        let records = vec![rec("a", 42.0, -71.0), rec("b", 44.0, -73.0)];
        let (lon, lat) = map_center(&records).unwrap();
        assert!((lon - (-72.0)).abs() < 1e-9);
        assert!((lat - 43.0).abs() < 1e-9);
    }

    #[test]
    fn test_map_center_empty_set() {
        assert_eq!(map_center(&[]), None);
    }

    #[test]
    fn test_half_spans_floor_for_single_point() {
        let records = vec![rec("a", 42.0, -71.0)];
        let center = map_center(&records).unwrap();
        let (half_lon, half_lat) = map_half_spans(&records, center);
        assert!(half_lon >= 0.01);
        assert!(half_lat >= 0.01);
    }

    #[test]
    fn test_half_spans_cover_extremes() {
        let records = vec![rec("a", 42.0, -71.0), rec("b", 44.0, -73.0)];
        let center = map_center(&records).unwrap();
        let (half_lon, half_lat) = map_half_spans(&records, center);
        assert!((half_lon - 1.0).abs() < 1e-9);
        assert!((half_lat - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_projection_maps_extremes_inside_canvas() {
        let records = vec![rec("a", 42.0, -71.0), rec("b", 44.0, -73.0)];
        let center = map_center(&records).unwrap();
        let half_spans = map_half_spans(&records, center);
        let canvas = Rect::from_min_size(Pos2::new(0.0, 0.0), Vec2::new(400.0, 300.0));

        for record in &records {
            let pos = project(record.longitude, record.latitude, center, half_spans, canvas);
            assert!(canvas.contains(pos));
        }

        // Northernmost record lands above the southernmost one.
        let north = project(-73.0, 44.0, center, half_spans, canvas);
        let south = project(-71.0, 42.0, center, half_spans, canvas);
        assert!(north.y < south.y);
    }
}
