// GUI implementation for the Transit Delay Analysis dashboard using egui/eframe
use crate::tda_controllers::{TdaControllers, VehicleFilter};
use crate::tda_models::{DelayCategory, FetchCache, TdaModels, VehicleRecord};
use crate::tda_views::TdaViews;
use eframe::egui;
use egui::{Color32, RichText, Ui};
use log::warn;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::{Duration, SystemTime};

// ============================================================================
// Application State
// ============================================================================

pub struct TdaApp {
    // Latest fetch snapshot, replaced wholesale on every refresh
    cache: Option<FetchCache>,

    // Loading state
    error_message: Option<String>,

    // Filter selections ("All" maps to None)
    filter_vehicle: Option<String>,
    filter_route: Option<String>,
    filter_category: Option<DelayCategory>,

    // Prediction route selector
    prediction_route: Option<String>,

    // Refresh bookkeeping
    last_attempt: Option<SystemTime>,
    refresh_counter: usize,

    // Background task holding the single in-flight fetch
    fetch_promise: Option<poll_promise::Promise<Result<FetchCache, String>>>,
}

impl Default for TdaApp {
    fn default() -> Self {
        Self {
            cache: None,
            error_message: None,
            filter_vehicle: None,
            filter_route: None,
            filter_category: None,
            prediction_route: None,
            last_attempt: None,
            refresh_counter: 0,
            fetch_promise: None,
        }
    }
}

// ============================================================================
// GUI Implementation
// ============================================================================

impl TdaApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let mut app = Self::default();

        // Start loading data in background
        app.start_fetch();

        app
    }

    fn start_fetch(&mut self) {
        let promise = poll_promise::Promise::spawn_thread("fetch_vehicles", || {
            let mut rng = StdRng::from_entropy();
            match TdaModels::fetch_snapshot(&mut rng) {
                Ok(cache) => Ok(cache),
                Err(e) => Err(format!("{}", e)),
            }
        });
        self.fetch_promise = Some(promise);
        self.last_attempt = Some(SystemTime::now());
    }

    fn check_fetch(&mut self) {
        if let Some(promise) = &self.fetch_promise {
            if let Some(result) = promise.ready() {
                match result {
                    Ok(cache) => {
                        self.cache = Some(cache.clone());
                        self.error_message = None;
                        self.refresh_counter += 1;
                    }
                    Err(e) => {
                        if self.cache.is_none() {
                            self.error_message = Some(format!("Failed to load vehicle data: {}", e));
                        } else {
                            // Keep showing the previous snapshot.
                            warn!("refresh failed: {}", e);
                        }
                    }
                }
                self.fetch_promise = None;
            }
        }
    }

    /// Spawns a fetch only when the snapshot is missing or past its window,
    /// and never while one is already in flight. A failed attempt is not
    /// retried until the window elapses again.
    fn refresh_if_stale(&mut self) {
        if self.fetch_promise.is_some() || self.error_message.is_some() {
            return;
        }

        let cache_wants_refresh = match &self.cache {
            Some(cache) => cache.is_stale(),
            None => true,
        };
        if !cache_wants_refresh {
            return;
        }

        let attempt_allowed = match self.last_attempt {
            Some(last) => {
                last.elapsed().unwrap_or(Duration::ZERO)
                    >= Duration::from_secs(TdaModels::FETCH_CACHE_MAX_AGE)
            }
            None => true,
        };
        if attempt_allowed {
            self.start_fetch();
        }
    }

    /// Manual refresh: a request inside a valid window is served from memory.
    fn request_refresh(&mut self) {
        if self.fetch_promise.is_some() {
            return;
        }
        let served_from_memory = self.cache.as_ref().map_or(false, |c| !c.is_stale());
        if !served_from_memory {
            self.start_fetch();
        }
    }

    fn active_filter(&self) -> VehicleFilter {
        VehicleFilter {
            vehicle_id: self.filter_vehicle.clone(),
            route: self.filter_route.clone(),
            category: self.filter_category,
        }
    }
}

impl eframe::App for TdaApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Poll the background fetch and refresh when the window has passed
        self.check_fetch();
        self.refresh_if_stale();

        // Keep the clock and the staleness gate ticking
        ctx.request_repaint_after(Duration::from_secs(1));

        // Top panel with header
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.vertical(|ui| {
                    ui.heading("🚇 Transit Delay Analysis - MBTA Boston");
                    ui.label("Live vehicle positions with simulated delay analytics");
                });
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(TdaModels::local_clock());
                });
            });
        });

        // Footer credit line
        egui::TopBottomPanel::bottom("footer_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label("Data: MBTA v3 API");
                ui.separator();
                ui.label("Delay figures are simulated");
                ui.separator();
                ui.label("Built with egui/eframe");
            });
        });

        // Show loading screen while the first snapshot is in flight
        if self.cache.is_none() && self.fetch_promise.is_some() {
            egui::CentralPanel::default().show(ctx, |ui| {
                ui.centered_and_justified(|ui| {
                    ui.vertical_centered(|ui| {
                        ui.spinner();
                        ui.label("Loading MBTA vehicle positions...");
                    });
                });
            });
            ctx.request_repaint_after(Duration::from_millis(100));
            return;
        }

        // Show error if the first fetch failed
        if let Some(error) = self.error_message.clone() {
            let mut should_retry = false;
            egui::CentralPanel::default().show(ctx, |ui| {
                ui.centered_and_justified(|ui| {
                    ui.vertical_centered(|ui| {
                        ui.colored_label(Color32::RED, "❌ Error");
                        ui.label(&error);
                        if ui.button("Retry").clicked() {
                            should_retry = true;
                        }
                    });
                });
            });
            if should_retry {
                self.error_message = None;
                self.start_fetch();
            }
            return;
        }

        // Clone the snapshot to avoid borrowing issues
        let records: Vec<VehicleRecord> = self
            .cache
            .as_ref()
            .map(|c| c.records.clone())
            .unwrap_or_default();
        let cache_age = self.cache.as_ref().map(|c| c.age_secs());

        // Left panel with filters and the prediction selector
        egui::SidePanel::left("filter_panel")
            .min_width(220.0)
            .show(ctx, |ui| {
                self.show_sidebar(ui, &records, cache_age);
            });

        // Central panel with the dashboard sections
        let filtered = self.active_filter().apply(&records);
        let prediction_route = self.prediction_route.clone();

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.heading("📊 Summary");
                TdaViews::show_summary_tiles(ui, &TdaControllers::summary(&records));
                ui.add_space(10.0);
                ui.separator();

                ui.heading("🚌 Vehicle Positions");
                ui.label(format!(
                    "{} of {} vehicles match the current filters",
                    filtered.len(),
                    records.len()
                ));
                TdaViews::show_vehicle_table(ui, &filtered);
                ui.add_space(10.0);
                ui.separator();

                ui.heading("🗺 Delay Map");
                TdaViews::show_map(ui, &filtered);
                ui.add_space(10.0);
                ui.separator();

                ui.heading("📈 Route Comparison");
                let comparison = TdaControllers::route_comparison(&records, &filtered);
                TdaViews::show_route_comparison(ui, &comparison);
                ui.add_space(10.0);
                ui.separator();

                ui.heading("📉 Average Delay by Route");
                TdaViews::show_route_averages(ui, &TdaControllers::route_averages(&records));
                ui.add_space(10.0);
                ui.separator();

                ui.heading("🔮 Best Time Prediction");
                match prediction_route {
                    Some(route) => {
                        let prediction = TdaControllers::predict(&records, &route);
                        TdaViews::show_prediction(ui, &route, &prediction);
                    }
                    None => {
                        ui.label("Select a route in the sidebar to see the prediction.");
                    }
                }
                ui.add_space(20.0);
            });
        });
    }
}

// ============================================================================
// Sidebar
// ============================================================================

impl TdaApp {
    fn show_sidebar(&mut self, ui: &mut Ui, records: &[VehicleRecord], cache_age: Option<u64>) {
        ui.heading("Filters");
        ui.separator();

        let vehicle_ids = TdaControllers::distinct_vehicle_ids(records);
        let routes = TdaControllers::distinct_routes(records);

        ui.label("Vehicle ID:");
        egui::ComboBox::from_id_source("vehicle_filter")
            .width(180.0)
            .selected_text(self.filter_vehicle.as_deref().unwrap_or("All"))
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut self.filter_vehicle, None, "All");
                for id in &vehicle_ids {
                    ui.selectable_value(&mut self.filter_vehicle, Some(id.clone()), id);
                }
            });

        ui.label("Route:");
        egui::ComboBox::from_id_source("route_filter")
            .width(180.0)
            .selected_text(self.filter_route.as_deref().unwrap_or("All"))
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut self.filter_route, None, "All");
                for route in &routes {
                    ui.selectable_value(&mut self.filter_route, Some(route.clone()), route);
                }
            });

        ui.label("Delay category:");
        egui::ComboBox::from_id_source("category_filter")
            .width(180.0)
            .selected_text(
                self.filter_category
                    .map(|c| c.label())
                    .unwrap_or("All"),
            )
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut self.filter_category, None, "All");
                for category in DelayCategory::ALL {
                    ui.selectable_value(
                        &mut self.filter_category,
                        Some(category),
                        category.label(),
                    );
                }
            });

        if ui.button("Clear filters").clicked() {
            self.filter_vehicle = None;
            self.filter_route = None;
            self.filter_category = None;
        }

        ui.add_space(20.0);
        ui.separator();
        ui.heading("Prediction");
        ui.label("Route:");
        egui::ComboBox::from_id_source("prediction_route")
            .width(180.0)
            .selected_text(self.prediction_route.as_deref().unwrap_or("Select..."))
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut self.prediction_route, None, "Select...");
                for route in TdaControllers::sorted_routes(records) {
                    let label = route.clone();
                    ui.selectable_value(&mut self.prediction_route, Some(route), label);
                }
            });

        ui.add_space(20.0);
        ui.separator();
        ui.heading("Data");

        let mut should_refresh = false;
        if ui.button("🔄 Refresh Now").clicked() {
            should_refresh = true;
        }
        if should_refresh {
            self.request_refresh();
        }

        if let Some(age) = cache_age {
            ui.label(format!("Last update: {}s ago", age));
        }
        if self.fetch_promise.is_some() {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Fetching...");
            });
        }
        ui.label(format!("Refreshes: {}", self.refresh_counter));
        ui.label(
            RichText::new(format!(
                "Snapshots auto-refresh every {} seconds",
                TdaModels::FETCH_CACHE_MAX_AGE
            ))
            .small(),
        );
    }
}

// ============================================================================
// Public entry point
// ============================================================================

pub fn run_gui() -> Result<(), eframe::Error> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([900.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Transit Delay Analysis",
        options,
        Box::new(|cc| Ok(Box::new(TdaApp::new(cc)))),
    )
}
