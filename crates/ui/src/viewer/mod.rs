//! Hero viewer: the slowly turning 3D model on the dashboard
//!
//! Everything the viewer owns hangs off [`HeroViewer`]; tearing it down
//! stops the frame loop, detaches listeners and loses the GPU context.

mod frame;
mod gpu;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use krishi_scene::{Model, OrbitControls, PerspectiveCamera, Scene};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{window, Event, HtmlCanvasElement, PointerEvent, ResizeObserver, ResizeObserverEntry, WheelEvent};

use frame::RenderLoop;
use gpu::GpuRenderer;

use crate::asset::fetch_bytes;
use crate::config::SceneConfig;
use crate::dom::{css_size, pin_css_size, Listener};
use crate::error::UiError;

/// Longest step fed to the controls, so a backgrounded tab doesn't spin
/// the model half a turn when it comes back.
const MAX_FRAME_DELTA: f32 = 0.25;
const NOMINAL_FRAME_DELTA: f32 = 1.0 / 60.0;

/// Seconds between two rAF timestamps (milliseconds).
pub fn frame_delta(previous: Option<f64>, now: f64) -> f32 {
    previous.map_or(NOMINAL_FRAME_DELTA, |prev| {
        (((now - prev) / 1000.0) as f32).clamp(0.0, MAX_FRAME_DELTA)
    })
}

/// Backing store size in device pixels for a CSS-sized surface.
pub fn backing_size(css_width: f64, css_height: f64, dpr: f64) -> (u32, u32) {
    let scale = |css: f64| (css * dpr).round().max(1.0) as u32;
    (scale(css_width), scale(css_height))
}

struct ViewerState {
    scene: Scene,
    controls: OrbitControls,
    gpu: Option<GpuRenderer>,
    canvas: HtmlCanvasElement,
    last_frame: Option<f64>,
}

impl ViewerState {
    fn frame(&mut self, timestamp: f64) {
        let dt = frame_delta(self.last_frame, timestamp);
        self.last_frame = Some(timestamp);
        self.controls.update(&mut self.scene.camera, dt);

        if let Some(gpu) = self.gpu.as_mut() {
            if let Err(e) = gpu.render(&self.scene) {
                log::warn!("Frame skipped: {e}");
            }
        }
    }

    fn resize(&mut self, css_width: f64, css_height: f64, dpr: f64) {
        self.scene.camera.set_aspect(css_width, css_height);
        let (width, height) = backing_size(css_width, css_height, dpr);
        self.canvas.set_width(width);
        self.canvas.set_height(height);
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.resize(width, height);
        }
    }

    fn install_model(&mut self, model: Model) {
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.upload_model(&model);
        }
        self.scene.set_model(model);
    }
}

pub struct HeroViewer {
    state: Rc<RefCell<ViewerState>>,
    render_loop: RenderLoop,
    listeners: Vec<Listener>,
    resize: (ResizeObserver, Closure<dyn FnMut(js_sys::Array)>),
}

impl HeroViewer {
    /// Open the GPU context, start the frame loop and kick off the model load.
    pub async fn start(canvas: HtmlCanvasElement, config: &SceneConfig) -> Result<Self, UiError> {
        let win = window().ok_or(UiError::NoWindow)?;
        let (css_width, css_height) = css_size(&canvas);
        pin_css_size(&canvas, css_width, css_height);
        let (width, height) = backing_size(css_width, css_height, win.device_pixel_ratio());
        canvas.set_width(width);
        canvas.set_height(height);

        let gpu = GpuRenderer::new(canvas.clone(), width, height, config.antialias).await?;
        let camera = PerspectiveCamera::for_surface(&config.camera, css_width, css_height);

        let state = Rc::new(RefCell::new(ViewerState {
            scene: Scene::new(camera, config.lights.clone()),
            controls: OrbitControls::new(config.controls.clone()),
            gpu: Some(gpu),
            canvas: canvas.clone(),
            last_frame: None,
        }));

        let listeners = attach_controls(&canvas, &state).map_err(UiError::from_js)?;
        let resize = observe_resize(&canvas, &state).map_err(UiError::from_js)?;

        let render_loop = {
            let state = state.clone();
            RenderLoop::start(&win, move |timestamp| state.borrow_mut().frame(timestamp))?
        };

        spawn_model_load(Rc::downgrade(&state), config.model_path.clone(), config.model_scale);

        Ok(Self {
            state,
            render_loop,
            listeners,
            resize,
        })
    }

    pub fn teardown(self) {
        let Self {
            state,
            render_loop,
            listeners,
            resize: (observer, resize_callback),
        } = self;

        render_loop.stop();
        drop(listeners);
        observer.disconnect();
        drop(resize_callback);

        let gpu = state.borrow_mut().gpu.take();
        if let Some(gpu) = gpu {
            gpu.release();
        }
        log::info!("Hero viewer torn down");
    }
}

async fn load_model(path: &str, scale: f32) -> Result<Model, UiError> {
    let bytes = fetch_bytes(path).await?;
    let mut model = Model::from_slice(&bytes)?;
    model.set_uniform_scale(scale);
    let center = model.center_at_origin();
    log::info!(
        "Loaded {path} ({} bytes, {} triangles), recentered by {center}",
        bytes.len(),
        model.triangle_count()
    );
    Ok(model)
}

fn spawn_model_load(state: Weak<RefCell<ViewerState>>, path: String, scale: f32) {
    spawn_local(async move {
        match load_model(&path, scale).await {
            Ok(model) => match state.upgrade() {
                Some(state) => state.borrow_mut().install_model(model),
                None => log::debug!("Hero viewer gone before {path} arrived"),
            },
            Err(e) => log::error!("Error loading 3D model: {e}"),
        }
    });
}

/// Pointer drag rotates, wheel zooms.
fn attach_controls(
    canvas: &HtmlCanvasElement,
    state: &Rc<RefCell<ViewerState>>,
) -> Result<Vec<Listener>, JsValue> {
    // keep touch drags from scrolling the page
    let _ = canvas.style().set_property("touch-action", "none");

    let on_down = {
        let state = state.clone();
        Listener::new(canvas, "pointerdown", move |e: Event| {
            if let Some(e) = e.dyn_ref::<PointerEvent>() {
                let mut state = state.borrow_mut();
                let _ = state.canvas.set_pointer_capture(e.pointer_id());
                state.controls.begin_rotate(e.client_x(), e.client_y());
            }
        })?
    };

    let on_move = {
        let state = state.clone();
        Listener::new(canvas, "pointermove", move |e: Event| {
            if let Some(e) = e.dyn_ref::<PointerEvent>() {
                let mut state = state.borrow_mut();
                let height = f64::from(state.canvas.client_height());
                state.controls.drag_to(e.client_x(), e.client_y(), height);
            }
        })?
    };

    let end_drag = |event: &'static str| {
        let state = state.clone();
        Listener::new(canvas, event, move |_: Event| {
            state.borrow_mut().controls.end_rotate();
        })
    };
    let on_up = end_drag("pointerup")?;
    let on_cancel = end_drag("pointercancel")?;

    let on_wheel = {
        let state = state.clone();
        Listener::new(canvas, "wheel", move |e: Event| {
            if let Some(wheel) = e.dyn_ref::<WheelEvent>() {
                let mut state = state.borrow_mut();
                if state.controls.settings.enable_zoom {
                    wheel.prevent_default();
                    state.controls.wheel(wheel.delta_y());
                }
            }
        })?
    };

    Ok(vec![on_down, on_move, on_up, on_cancel, on_wheel])
}

/// Follow the canvas' displayed size.
fn observe_resize(
    canvas: &HtmlCanvasElement,
    state: &Rc<RefCell<ViewerState>>,
) -> Result<(ResizeObserver, Closure<dyn FnMut(js_sys::Array)>), JsValue> {
    let state = state.clone();
    let callback = Closure::wrap(Box::new(move |entries: js_sys::Array| {
        let dpr = window().map_or(1.0, |w| w.device_pixel_ratio());
        for entry in entries.iter() {
            if let Ok(entry) = entry.dyn_into::<ResizeObserverEntry>() {
                let rect = entry.content_rect();
                state.borrow_mut().resize(rect.width(), rect.height(), dpr);
            }
        }
    }) as Box<dyn FnMut(js_sys::Array)>);

    let observer = ResizeObserver::new(callback.as_ref().unchecked_ref())?;
    observer.observe(canvas);
    Ok((observer, callback))
}

enum Slot {
    Starting,
    Running(HeroViewer),
    Stopped,
}

/// Shared handle to a viewer that may still be starting up.
#[derive(Clone)]
pub struct ViewerHandle {
    slot: Rc<RefCell<Slot>>,
}

impl ViewerHandle {
    fn starting() -> Self {
        Self {
            slot: Rc::new(RefCell::new(Slot::Starting)),
        }
    }

    fn install(&self, viewer: HeroViewer) {
        let mut slot = self.slot.borrow_mut();
        if matches!(*slot, Slot::Stopped) {
            drop(slot);
            viewer.teardown();
            return;
        }
        *slot = Slot::Running(viewer);
    }

    #[cfg(test)]
    fn is_running(&self) -> bool {
        matches!(*self.slot.borrow(), Slot::Running(_))
    }

    #[cfg(test)]
    fn is_stopped(&self) -> bool {
        matches!(*self.slot.borrow(), Slot::Stopped)
    }

    /// Stop the viewer; one still starting is torn down as soon as it is ready.
    pub fn teardown(&self) {
        let previous = std::mem::replace(&mut *self.slot.borrow_mut(), Slot::Stopped);
        if let Slot::Running(viewer) = previous {
            viewer.teardown();
        }
    }
}

/// Start the hero viewer on `canvas`. Without a canvas nothing is created.
pub fn bootstrap(canvas: Option<HtmlCanvasElement>, config: &SceneConfig) -> Option<ViewerHandle> {
    let canvas = canvas?;
    let handle = ViewerHandle::starting();

    let pending = handle.clone();
    let config = config.clone();
    spawn_local(async move {
        match HeroViewer::start(canvas, &config).await {
            Ok(viewer) => pending.install(viewer),
            Err(e) => {
                log::error!("Hero viewer unavailable: {e}");
                pending.teardown();
            }
        }
    });

    Some(handle)
}


#[cfg(all(test, target_arch = "wasm32"))]
mod browser_tests {
    use wasm_bindgen_test::wasm_bindgen_test;

    use super::*;

    fn mounted_canvas(width: &str, height: &str) -> HtmlCanvasElement {
        let document = window().and_then(|w| w.document()).unwrap();
        let canvas = document
            .create_element("canvas")
            .unwrap()
            .dyn_into::<HtmlCanvasElement>()
            .unwrap();
        let style = canvas.style();
        style.set_property("display", "block").unwrap();
        style.set_property("width", width).unwrap();
        style.set_property("height", height).unwrap();
        document.body().unwrap().append_child(&canvas).unwrap();
        canvas
    }

    #[wasm_bindgen_test]
    async fn test_start_pins_css_size_and_teardown_releases_state() {
        let canvas = mounted_canvas("320px", "180px");
        let viewer = HeroViewer::start(canvas.clone(), &SceneConfig::default())
            .await
            .unwrap();

        // the backing store is device sized, layout stays at the CSS size
        let dpr = window().unwrap().device_pixel_ratio();
        assert_eq!((canvas.width(), canvas.height()), backing_size(320.0, 180.0, dpr));
        assert_eq!(canvas.style().get_property_value("width").unwrap(), "320px");
        assert_eq!(canvas.style().get_property_value("height").unwrap(), "180px");
        assert_eq!(canvas.client_width(), 320);

        let state = Rc::downgrade(&viewer.state);
        assert!(state.upgrade().is_some_and(|s| s.borrow().gpu.is_some()));
        viewer.teardown();
        assert!(state.upgrade().is_none());
        canvas.remove();
    }

    #[wasm_bindgen_test]
    async fn test_handle_teardown_stops_running_viewer() {
        let canvas = mounted_canvas("200px", "200px");
        let viewer = HeroViewer::start(canvas.clone(), &SceneConfig::default())
            .await
            .unwrap();
        let state = Rc::downgrade(&viewer.state);

        let handle = ViewerHandle::starting();
        handle.install(viewer);
        assert!(handle.is_running());

        handle.teardown();
        assert!(handle.is_stopped());
        assert!(state.upgrade().is_none());
        canvas.remove();
    }
}
