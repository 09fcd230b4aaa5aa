//! Canvas 2D scene composition.
//!
//! Frames are composed on a pooled offscreen canvas and blitted to the
//! visible canvas in one `drawImage`, so a slow frame never shows a
//! half-painted chart.

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use std::rc::Rc;

use crate::application::render_pipeline::{FrameSkipped, SceneCompositor};
use crate::application::state::{ChartState, SharedState};
use crate::domain::chart::{ChartKind, PanelRegion};
use crate::domain::market_data::IndicatorSeries;

use super::geometry::{
    compute_layout, price_scale, price_to_y, visible_geometry, Rect, SceneLayout,
};
use super::surface_pool::{CanvasSurface, CanvasSurfaceFactory, SurfacePool};

const BACKGROUND: &str = "#10141c";
const GRID: &str = "#1e2430";
const BULL: &str = "#2e9e6b";
const BEAR: &str = "#d4544d";
const LINE: &str = "#5c9ded";
const AREA_FILL: &str = "rgba(92, 157, 237, 0.18)";
const VOLUME: &str = "rgba(120, 130, 150, 0.5)";
const TEXT: &str = "#aab4c4";
const CROSSHAIR: &str = "rgba(170, 180, 196, 0.6)";
const BANNER_BG: &str = "rgba(212, 84, 77, 0.9)";
const PANEL_FRAME: &str = "#2a3140";
const GRID_LINES: u32 = 5;

pub struct Canvas2dCompositor {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
    pool: Rc<SurfacePool<CanvasSurfaceFactory>>,
    device_pixel_ratio: f64,
}

impl Canvas2dCompositor {
    pub fn attach(
        canvas_id: &str,
        pool: Rc<SurfacePool<CanvasSurfaceFactory>>,
    ) -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;
        let canvas: HtmlCanvasElement = document
            .get_element_by_id(canvas_id)
            .ok_or_else(|| JsValue::from_str("canvas element not found"))?
            .dyn_into()?;
        let context: CanvasRenderingContext2d = canvas
            .get_context("2d")?
            .ok_or_else(|| JsValue::from_str("2d context unavailable"))?
            .dyn_into()?;
        let device_pixel_ratio = window.device_pixel_ratio().max(1.0);
        Ok(Self {
            canvas,
            context,
            pool,
            device_pixel_ratio,
        })
    }

    /// Resizes the backing store for a new CSS size.
    pub fn resize(&self, css_width: f64, css_height: f64) {
        self.canvas
            .set_width((css_width * self.device_pixel_ratio) as u32);
        self.canvas
            .set_height((css_height * self.device_pixel_ratio) as u32);
    }

    fn compose(&self, ctx: &CanvasRenderingContext2d, state: &ChartState, hover: Option<(f64, f64)>) {
        let css_width = self.canvas.width() as f64 / self.device_pixel_ratio;
        let css_height = self.canvas.height() as f64 / self.device_pixel_ratio;
        let layout = compute_layout(css_width, css_height, &state.panels);

        fill_rect(ctx, 0.0, 0.0, css_width, css_height, BACKGROUND);
        self.draw_grid(ctx, &layout.price_area);

        if !state.data_ready {
            if state.loading {
                center_text(ctx, &layout.price_area, "loading history\u{2026}");
            }
        } else if state.candles.is_empty() {
            center_text(ctx, &layout.price_area, "no data for this market");
        } else {
            self.draw_series(ctx, state, &layout);
            self.draw_overlays(ctx, state, &layout.price_area);
        }
        for region in &layout.panels {
            self.draw_panel(ctx, state, region, css_width);
        }
        if let Some((x, y)) = hover {
            self.draw_crosshair(ctx, x, y, css_width, css_height);
        }
        if let Some(err) = &state.error {
            self.draw_error_banner(ctx, css_width, &err.to_string());
        }
    }

    fn draw_grid(&self, ctx: &CanvasRenderingContext2d, area: &Rect) {
        ctx.set_stroke_style(&JsValue::from_str(GRID));
        ctx.set_line_width(1.0);
        for i in 1..=GRID_LINES {
            let y = area.y + area.height * i as f64 / (GRID_LINES + 1) as f64;
            ctx.begin_path();
            ctx.move_to(area.x, y);
            ctx.line_to(area.x + area.width, y);
            ctx.stroke();
        }
    }

    fn draw_series(&self, ctx: &CanvasRenderingContext2d, state: &ChartState, layout: &SceneLayout) {
        let geometry = visible_geometry(&state.candles, &state.viewport, &layout.price_area);
        if geometry.is_empty() {
            return;
        }
        // Volume strip first so candles overdraw any overlap.
        ctx.set_fill_style(&JsValue::from_str(VOLUME));
        for geom in &geometry {
            let height = layout.volume_area.height * geom.volume_fraction;
            ctx.fill_rect(
                geom.body_left,
                layout.volume_area.bottom() - height,
                geom.body_width,
                height,
            );
        }
        match state.chart_kind {
            ChartKind::Candles => {
                for geom in &geometry {
                    let color = if geom.bullish { BULL } else { BEAR };
                    ctx.set_stroke_style(&JsValue::from_str(color));
                    ctx.set_fill_style(&JsValue::from_str(color));
                    ctx.set_line_width(1.0);
                    ctx.begin_path();
                    ctx.move_to(geom.center_x, geom.wick_top);
                    ctx.line_to(geom.center_x, geom.wick_bottom);
                    ctx.stroke();
                    let body_height = (geom.body_bottom - geom.body_top).max(1.0);
                    ctx.fill_rect(geom.body_left, geom.body_top, geom.body_width, body_height);
                }
            }
            ChartKind::Bars => {
                for geom in &geometry {
                    let color = if geom.bullish { BULL } else { BEAR };
                    ctx.set_stroke_style(&JsValue::from_str(color));
                    ctx.set_line_width(1.5);
                    ctx.begin_path();
                    ctx.move_to(geom.center_x, geom.wick_top);
                    ctx.line_to(geom.center_x, geom.wick_bottom);
                    ctx.move_to(geom.body_left, geom.body_top);
                    ctx.line_to(geom.center_x, geom.body_top);
                    ctx.move_to(geom.center_x, geom.body_bottom);
                    ctx.line_to(geom.body_left + geom.body_width, geom.body_bottom);
                    ctx.stroke();
                }
            }
            ChartKind::Line | ChartKind::Area => {
                ctx.set_stroke_style(&JsValue::from_str(LINE));
                ctx.set_line_width(1.5);
                ctx.begin_path();
                for (i, geom) in geometry.iter().enumerate() {
                    if i == 0 {
                        ctx.move_to(geom.center_x, geom.close_y);
                    } else {
                        ctx.line_to(geom.center_x, geom.close_y);
                    }
                }
                ctx.stroke();
                if state.chart_kind == ChartKind::Area {
                    let first = geometry.first().map(|g| g.center_x).unwrap_or(0.0);
                    let last = geometry.last().map(|g| g.center_x).unwrap_or(0.0);
                    ctx.line_to(last, layout.price_area.bottom());
                    ctx.line_to(first, layout.price_area.bottom());
                    ctx.close_path();
                    ctx.set_fill_style(&JsValue::from_str(AREA_FILL));
                    ctx.fill();
                }
            }
        }
    }

    fn draw_overlays(&self, ctx: &CanvasRenderingContext2d, state: &ChartState, area: &Rect) {
        let Some((min, max)) = price_scale(&state.candles, &state.viewport) else {
            return;
        };
        for config in state.indicators.configs() {
            if !config.visible || !config.kind.is_overlay() {
                continue;
            }
            let Some(series) = state.indicators.output(&config.id) else {
                continue;
            };
            ctx.set_stroke_style(&JsValue::from_str(&css_color(config.color)));
            ctx.set_line_width(1.0);
            stroke_indicator(ctx, &state.viewport, series, |value| {
                price_to_y(value, min, max, area)
            });
        }
    }

    fn draw_panel(
        &self,
        ctx: &CanvasRenderingContext2d,
        state: &ChartState,
        region: &PanelRegion,
        width: f64,
    ) {
        ctx.set_stroke_style(&JsValue::from_str(PANEL_FRAME));
        ctx.set_line_width(1.0);
        ctx.stroke_rect(0.5, region.top + 0.5, width - 1.0, region.height - 1.0);
        ctx.set_fill_style(&JsValue::from_str(TEXT));
        ctx.set_font("11px sans-serif");
        let _ = ctx.fill_text(&region.id, 6.0, region.top + 14.0);
        if region.collapsed {
            return;
        }
        let Some(config) = state
            .indicators
            .configs()
            .iter()
            .find(|c| c.id == region.id)
        else {
            return;
        };
        let Some(series) = state.indicators.output(&config.id) else {
            return;
        };
        // Oscillator scale is fixed 0..100 with 30/70 guides.
        let area = Rect {
            x: 0.0,
            y: region.top,
            width,
            height: region.height,
        };
        ctx.set_stroke_style(&JsValue::from_str(GRID));
        for guide in [30.0, 70.0] {
            let y = area.y + (100.0 - guide) / 100.0 * area.height;
            ctx.begin_path();
            ctx.move_to(0.0, y);
            ctx.line_to(width, y);
            ctx.stroke();
        }
        ctx.set_stroke_style(&JsValue::from_str(&css_color(config.color)));
        stroke_indicator(ctx, &state.viewport, series, |value| {
            area.y + (100.0 - value.clamp(0.0, 100.0)) / 100.0 * area.height
        });
    }

    fn draw_crosshair(
        &self,
        ctx: &CanvasRenderingContext2d,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) {
        ctx.set_stroke_style(&JsValue::from_str(CROSSHAIR));
        ctx.set_line_width(1.0);
        ctx.begin_path();
        ctx.move_to(x, 0.0);
        ctx.line_to(x, height);
        ctx.move_to(0.0, y);
        ctx.line_to(width, y);
        ctx.stroke();
    }

    fn draw_error_banner(&self, ctx: &CanvasRenderingContext2d, width: f64, message: &str) {
        fill_rect(ctx, 0.0, 0.0, width, 24.0, BANNER_BG);
        ctx.set_fill_style(&JsValue::from_str("#ffffff"));
        ctx.set_font("12px sans-serif");
        let _ = ctx.fill_text(&format!("{message} \u{2014} tap to retry"), 8.0, 16.0);
    }
}

impl SceneCompositor for Canvas2dCompositor {
    fn compose_and_blit(
        &self,
        state: &SharedState,
        hover: Option<(f64, f64)>,
        _now_ms: f64,
    ) -> Result<(), FrameSkipped> {
        self.pool.maybe_sweep();
        let width = self.canvas.width();
        let height = self.canvas.height();
        if width == 0 || height == 0 {
            return Err(FrameSkipped);
        }
        let CanvasSurface { canvas, context } =
            self.pool.acquire(width, height).ok_or(FrameSkipped)?;
        context
            .set_transform(
                self.device_pixel_ratio,
                0.0,
                0.0,
                self.device_pixel_ratio,
                0.0,
                0.0,
            )
            .map_err(|_| FrameSkipped)?;
        {
            let state = state.borrow();
            self.compose(&context, &state, hover);
        }
        self.context
            .set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
            .map_err(|_| FrameSkipped)?;
        let blit = self
            .context
            .draw_image_with_html_canvas_element(&canvas, 0.0, 0.0);
        self.pool
            .release(CanvasSurface { canvas, context }, width, height);
        blit.map_err(|_| FrameSkipped)
    }
}

fn stroke_indicator(
    ctx: &CanvasRenderingContext2d,
    viewport: &crate::domain::chart::ViewportController,
    series: &IndicatorSeries,
    value_to_y: impl Fn(f64) -> f64,
) {
    ctx.begin_path();
    let mut started = false;
    for (offset, value) in series.values.iter().enumerate() {
        let index = series.first_index + offset;
        let x = viewport.px_at_index(index as f64 + 0.5);
        if x < -2.0 || x > viewport.width_px() + 2.0 {
            continue;
        }
        let y = value_to_y(*value);
        if started {
            ctx.line_to(x, y);
        } else {
            ctx.move_to(x, y);
            started = true;
        }
    }
    ctx.stroke();
}

fn fill_rect(ctx: &CanvasRenderingContext2d, x: f64, y: f64, w: f64, h: f64, color: &str) {
    ctx.set_fill_style(&JsValue::from_str(color));
    ctx.fill_rect(x, y, w, h);
}

fn center_text(ctx: &CanvasRenderingContext2d, area: &Rect, message: &str) {
    ctx.set_fill_style(&JsValue::from_str(TEXT));
    ctx.set_font("13px sans-serif");
    ctx.set_text_align("center");
    let _ = ctx.fill_text(
        message,
        area.x + area.width / 2.0,
        area.y + area.height / 2.0,
    );
    ctx.set_text_align("start");
}

fn css_color(rgba: u32) -> String {
    format!(
        "rgba({}, {}, {}, {:.3})",
        (rgba >> 16) & 0xff,
        (rgba >> 8) & 0xff,
        rgba & 0xff,
        ((rgba >> 24) & 0xff) as f64 / 255.0
    )
}
