// Wayland integration module
// Hosts the overlay session on wlr-layer-shell using smithay-client-toolkit.
// Three layer surfaces: the fullscreen ghost image, the small floating
// control (FAB), and the on-demand control panel. Passthrough in locked mode
// is realized with an empty input region on the image surface, so the
// compositor routes those touches to whatever is underneath.

use crate::gesture::{PointerEvent as GestureEvent, PointerPhase, PointerSample};
use crate::geometry::Point;
use crate::image_loader::ImageData;
use crate::mode::{AttributeSink, OverlayMode, WindowAttributes};
use crate::overlay::{OverlaySession, PanelCommand, PanelOutcome, SessionParams, FAB_SIZE};
use crate::transform::TransformState;
use crate::wgpu_renderer::WgpuRenderer;
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use smithay_client_toolkit::{
    compositor::{CompositorHandler, CompositorState, Region},
    delegate_compositor, delegate_keyboard, delegate_layer, delegate_output, delegate_pointer,
    delegate_registry, delegate_seat, delegate_shm, delegate_touch,
    output::{OutputHandler, OutputState},
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    seat::{
        keyboard::{KeyEvent, KeyboardHandler, Keysym, Modifiers},
        pointer::{PointerEvent, PointerEventKind, PointerHandler},
        touch::TouchHandler,
        Capability, SeatHandler, SeatState,
    },
    shell::{
        wlr_layer::{
            Anchor, KeyboardInteractivity, Layer, LayerShell, LayerShellHandler, LayerSurface,
            LayerSurfaceConfigure,
        },
        WaylandSurface,
    },
    shm::{
        slot::{Buffer, SlotPool},
        Shm, ShmHandler,
    },
};
use std::time::Instant;
use wayland_client::{
    globals::registry_queue_init,
    protocol::{wl_keyboard, wl_output, wl_pointer, wl_seat, wl_shm, wl_surface, wl_touch},
    Connection, Proxy, QueueHandle,
};

/// Mouse button constants
const BTN_LEFT: u32 = 272;

/// Maximum surface size to prevent buffer allocation failures
const MAX_SIZE: u32 = 4096;

/// Maximum buffer size (64MB to avoid Wayland buffer issues)
const MAX_BUFFER_SIZE: usize = 64 * 1024 * 1024;

/// Opacity step for the panel +/- rows and the scroll wheel
const OPACITY_STEP_PERCENT: i32 = 5;

/// Control panel row layout
const PANEL_ROW_HEIGHT: u32 = 25;
const PANEL_WIDTH: u32 = 180;
const PANEL_ROWS: u32 = 5;

/// Which of our layer surfaces an input event landed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SurfaceRole {
    Image,
    Fab,
    Panel,
}

/// One active touch point, in the local coordinates of its surface
#[derive(Debug, Clone, Copy)]
struct TouchPoint {
    id: i32,
    role: SurfaceRole,
    x: f64,
    y: f64,
}

/// Applies the session's window attributes to the image layer surface. The
/// only attribute with a protocol-level equivalent is touchability, realized
/// through the input region; alpha is folded into the rendered buffer, so an
/// update just marks the image dirty.
struct ImageWindowSink<'a> {
    layer: Option<&'a LayerSurface>,
    compositor: &'a CompositorState,
    dirty: bool,
}

impl AttributeSink for ImageWindowSink<'_> {
    fn apply(&mut self, attrs: &WindowAttributes) -> Result<()> {
        let layer = self
            .layer
            .context("image surface is not mapped yet")?;
        if attrs.touchable {
            // Reset to the default (infinite) input region
            layer.wl_surface().set_input_region(None);
        } else {
            // An empty region makes every touch fall through to whatever is
            // below the overlay
            let region =
                Region::new(self.compositor).context("failed to create input region")?;
            layer.wl_surface().set_input_region(Some(region.wl_region()));
        }
        layer.wl_surface().commit();
        debug!(
            "image window updated: touchable={}, alpha={:.2}",
            attrs.touchable, attrs.alpha
        );
        self.dirty = true;
        Ok(())
    }
}

/// Main Wayland application state
struct WaylandApp {
    // Registry state
    registry_state: RegistryState,
    // Seat state for input handling
    seat_state: SeatState,
    // Output state for display info
    output_state: OutputState,
    // Shared memory for buffer allocation
    shm: Shm,
    // Layer shell for overlay windows
    layer_shell: LayerShell,
    // Compositor state
    compositor_state: CompositorState,

    // Wayland display pointer (for GPU rendering)
    display_ptr: *mut std::ffi::c_void,

    // Application-specific state
    image: ImageData,
    session: OverlaySession,
    should_exit: bool,

    // Display dimensions
    display_width: u32,
    display_height: u32,

    // The three overlay surfaces and their buffer pools
    image_layer: Option<LayerSurface>,
    fab_layer: Option<LayerSurface>,
    panel_layer: Option<LayerSurface>,
    image_pool: Option<SlotPool>,
    fab_pool: Option<SlotPool>,
    panel_pool: Option<SlotPool>,
    image_buffer: Option<Buffer>,
    fab_buffer: Option<Buffer>,
    panel_buffer: Option<Buffer>,

    // Image surface size (compositor-assigned, fullscreen)
    width: u32,
    height: u32,
    configured: bool,

    // Whether the FAB surface currently has a buffer attached
    fab_mapped: bool,

    // Pointer state: last known position and which surface it is on
    pointer_pos: (f64, f64),
    pointer_role: Option<SurfaceRole>,
    image_mouse_down: bool,
    fab_mouse_down: bool,

    // Active touch points across all surfaces, in down order
    touch_points: Vec<TouchPoint>,
    fab_touch_id: Option<i32>,

    // Wall-clock anchor for the FAB long-press check between input events
    fab_press: Option<(Instant, u32)>,

    // Redraw flag for the image surface
    needs_redraw: bool,

    // GPU rendering
    use_gpu: bool,
    gpu_renderer: Option<WgpuRenderer>,
    gpu_initialized: bool,
}

impl WaylandApp {
    #[allow(clippy::too_many_arguments)]
    fn new(
        registry_state: RegistryState,
        seat_state: SeatState,
        output_state: OutputState,
        shm: Shm,
        layer_shell: LayerShell,
        compositor_state: CompositorState,
        display_ptr: *mut std::ffi::c_void,
        image: ImageData,
        session: OverlaySession,
        use_gpu: bool,
    ) -> Self {
        Self {
            registry_state,
            seat_state,
            output_state,
            shm,
            layer_shell,
            compositor_state,
            display_ptr,
            image,
            session,
            should_exit: false,
            display_width: 1920,
            display_height: 1080,
            image_layer: None,
            fab_layer: None,
            panel_layer: None,
            image_pool: None,
            fab_pool: None,
            panel_pool: None,
            image_buffer: None,
            fab_buffer: None,
            panel_buffer: None,
            width: 0,
            height: 0,
            configured: false,
            fab_mapped: false,
            pointer_pos: (0.0, 0.0),
            pointer_role: None,
            image_mouse_down: false,
            fab_mouse_down: false,
            touch_points: Vec::new(),
            fab_touch_id: None,
            fab_press: None,
            needs_redraw: false,
            use_gpu,
            gpu_renderer: None,
            gpu_initialized: false,
        }
    }

    fn role_of(&self, surface: &wl_surface::WlSurface) -> Option<SurfaceRole> {
        if Some(surface) == self.image_layer.as_ref().map(|l| l.wl_surface()) {
            Some(SurfaceRole::Image)
        } else if Some(surface) == self.fab_layer.as_ref().map(|l| l.wl_surface()) {
            Some(SurfaceRole::Fab)
        } else if Some(surface) == self.panel_layer.as_ref().map(|l| l.wl_surface()) {
            Some(SurfaceRole::Panel)
        } else {
            None
        }
    }

    /// The FAB surface follows the pointer, so its local coordinates rebase
    /// after every move. Reconstruct screen coordinates from the anchored
    /// position plus the local offset before feeding the drag controller.
    fn fab_raw(&self, local: (f64, f64)) -> Point {
        let (fx, fy) = self.session.fab_position();
        Point::new(fx as f32 + local.0 as f32, fy as f32 + local.1 as f32)
    }

    /// Feed a synthesized pointer event for the image surface into the
    /// gesture interpreter. The mouse is a single pointer with id 0; touch
    /// events carry their real ids.
    fn image_event(&mut self, phase: PointerPhase, time_ms: u32, pointers: Vec<PointerSample>) {
        let event = GestureEvent {
            phase,
            time_ms,
            pointers,
        };
        if self.session.handle_image_event(&event) {
            self.needs_redraw = true;
        }
    }

    fn image_touch_samples(&self) -> Vec<PointerSample> {
        self.touch_points
            .iter()
            .filter(|p| p.role == SurfaceRole::Image)
            .map(|p| PointerSample {
                id: p.id,
                x: p.x as f32,
                y: p.y as f32,
            })
            .collect()
    }

    fn image_touch_count(&self) -> usize {
        self.touch_points
            .iter()
            .filter(|p| p.role == SurfaceRole::Image)
            .count()
    }

    /// Map a press inside the panel to its row command
    fn panel_command_at(&self, y: f64) -> Option<PanelCommand> {
        let row = (y / PANEL_ROW_HEIGHT as f64) as usize;
        let locked = self.session.mode().mode() == OverlayMode::Locked;
        let percent = (self.session.mode().opacity() * 100.0).round() as i32;
        match row {
            0 => Some(PanelCommand::SetLocked(!locked)),
            1 => Some(PanelCommand::OpacityChanged(percent - OPACITY_STEP_PERCENT)),
            2 => Some(PanelCommand::OpacityChanged(percent + OPACITY_STEP_PERCENT)),
            3 => Some(PanelCommand::Back),
            4 => Some(PanelCommand::Close),
            _ => None,
        }
    }

    fn panel_rows(&self) -> [&'static str; PANEL_ROWS as usize] {
        let lock_label = match self.session.mode().mode() {
            OverlayMode::Locked => "Lock: On",
            OverlayMode::Editing => "Lock: Off",
        };
        [lock_label, "Opacity -", "Opacity +", "Back", "Close"]
    }

    fn apply_panel_command(&mut self, command: PanelCommand, qh: &QueueHandle<Self>) {
        let mut sink = ImageWindowSink {
            layer: self.image_layer.as_ref(),
            compositor: &self.compositor_state,
            dirty: false,
        };
        let outcome = self.session.panel_command(command, &mut sink);
        self.needs_redraw |= sink.dirty;
        if outcome == PanelOutcome::CloseOverlay {
            info!("panel close: exiting");
            self.should_exit = true;
            return;
        }
        self.sync_controls(qh);
        self.draw_panel();
        self.draw_image(qh);
    }

    /// Reconcile the FAB and panel surfaces with what the session says should
    /// be visible (exactly one of the two at a time)
    fn sync_controls(&mut self, qh: &QueueHandle<Self>) {
        if self.session.panel_visible() {
            if self.panel_layer.is_none() {
                self.create_panel(qh);
            }
            if self.fab_mapped {
                self.hide_fab();
            }
        } else {
            if let Some(panel) = self.panel_layer.take() {
                drop(panel);
                self.panel_buffer = None;
                self.panel_pool = None;
                debug!("panel surface destroyed");
            }
            if !self.fab_mapped {
                self.update_fab_position();
                self.draw_fab();
            }
        }
    }

    fn create_panel(&mut self, qh: &QueueHandle<Self>) {
        let surface = self.compositor_state.create_surface(qh);
        let layer = self.layer_shell.create_layer_surface(
            qh,
            surface,
            Layer::Overlay,
            Some("rghost-panel"),
            None,
        );
        let (px, py) = self.session.panel_position();
        layer.set_anchor(Anchor::TOP | Anchor::LEFT);
        layer.set_margin(py, 0, 0, px);
        layer.set_size(PANEL_WIDTH, PANEL_ROWS * PANEL_ROW_HEIGHT);
        layer.set_keyboard_interactivity(KeyboardInteractivity::OnDemand);
        layer.commit();
        self.panel_layer = Some(layer);
        debug!("panel surface created at ({}, {})", px, py);
    }

    fn update_fab_position(&mut self) {
        if let Some(ref layer) = self.fab_layer {
            let (fx, fy) = self.session.fab_position();
            layer.set_anchor(Anchor::TOP | Anchor::LEFT);
            layer.set_margin(fy, 0, 0, fx);
            layer.commit();
        }
    }

    fn hide_fab(&mut self) {
        if let Some(ref layer) = self.fab_layer {
            layer.wl_surface().attach(None, 0, 0);
            layer.wl_surface().commit();
            self.fab_mapped = false;
        }
    }

    /// Stationary long-press check between input events. The recognizer works
    /// in event time, so elapsed wall-clock time is rebased onto the event
    /// timestamp taken at the press.
    fn poll_fab(&mut self, qh: &QueueHandle<Self>) {
        let Some((started, down_time)) = self.fab_press else {
            return;
        };
        let synthetic = down_time.wrapping_add(started.elapsed().as_millis() as u32);
        let mut sink = ImageWindowSink {
            layer: self.image_layer.as_ref(),
            compositor: &self.compositor_state,
            dirty: false,
        };
        let fired = self.session.fab_poll(synthetic, &mut sink);
        self.needs_redraw |= sink.dirty;
        if fired.is_some() {
            self.sync_controls(qh);
            self.draw_image(qh);
        }
    }

    /// Initialize GPU renderer from the image layer surface
    fn init_gpu_renderer(&mut self) {
        if self.gpu_initialized {
            return;
        }

        let layer_surface = match &self.image_layer {
            Some(ls) => ls,
            None => {
                warn!("Cannot init GPU: no layer surface");
                return;
            }
        };

        // With the wayland-backend client_system feature, ObjectId::as_ptr()
        // yields the raw wl_surface pointer wgpu needs
        let wl_surface = layer_surface.wl_surface();
        let surface_ptr = wl_surface.id().as_ptr() as *mut std::ffi::c_void;
        let display_ptr = self.display_ptr;

        if display_ptr.is_null() {
            warn!("Display pointer is null, falling back to CPU rendering");
            self.use_gpu = false;
            return;
        }

        info!(
            "Initializing GPU renderer ({}x{})",
            self.width, self.height
        );

        match WgpuRenderer::new(display_ptr, surface_ptr, self.width, self.height) {
            Ok(mut renderer) => {
                if let Err(e) = renderer.upload_texture(&self.image) {
                    warn!("Failed to upload texture to GPU: {:?}", e);
                    self.use_gpu = false;
                    return;
                }
                self.gpu_renderer = Some(renderer);
                self.gpu_initialized = true;
                info!("GPU renderer initialized successfully");
            }
            Err(e) => {
                warn!("Failed to initialize GPU renderer: {:?}", e);
                warn!("Falling back to CPU rendering");
                self.use_gpu = false;
            }
        }
    }

    /// Draw the transformed image to its surface
    fn draw_image(&mut self, _qh: &QueueHandle<Self>) {
        if !self.configured || self.image_layer.is_none() {
            return;
        }

        if self.use_gpu && self.gpu_renderer.is_some() {
            if self.draw_image_gpu() {
                return;
            }
            warn!("GPU rendering failed, falling back to CPU");
        }

        self.draw_image_cpu();
    }

    fn draw_image_gpu(&mut self) -> bool {
        let renderer = match self.gpu_renderer.as_mut() {
            Some(r) => r,
            None => return false,
        };

        renderer.resize(self.width, self.height);
        renderer.update_pose(self.session.transform(), self.session.mode().effective_alpha());

        match renderer.render(self.session.image_visible()) {
            Ok(true) => {
                if let Some(ref layer) = self.image_layer {
                    layer.wl_surface().commit();
                }
                self.needs_redraw = false;
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!("GPU render error: {:?}", e);
                false
            }
        }
    }

    /// CPU rendering: inverse-transform sampling of the image into a
    /// shared-memory buffer
    fn draw_image_cpu(&mut self) {
        let width = self.width.clamp(1, MAX_SIZE);
        let height = self.height.clamp(1, MAX_SIZE);

        let stride = width as i32 * 4;
        let buffer_size = (stride * height as i32) as usize;
        if buffer_size > MAX_BUFFER_SIZE {
            error!(
                "Buffer size too large: {} bytes, max: {} bytes",
                buffer_size, MAX_BUFFER_SIZE
            );
            return;
        }

        let visible = self.session.image_visible();
        let alpha = self.session.mode().effective_alpha();
        let transform = *self.session.transform();

        if self.image_pool.is_none() {
            match SlotPool::new(buffer_size, &self.shm) {
                Ok(pool) => self.image_pool = Some(pool),
                Err(e) => {
                    error!("Failed to create slot pool: {}", e);
                    return;
                }
            }
        }
        let pool = self.image_pool.as_mut().unwrap();
        if pool.len() < buffer_size {
            if let Err(e) = pool.resize(buffer_size) {
                error!("Failed to resize pool to {} bytes: {}", buffer_size, e);
                self.image_pool = None;
                return;
            }
        }

        let (buffer, canvas) = match pool.create_buffer(
            width as i32,
            height as i32,
            stride,
            wl_shm::Format::Argb8888,
        ) {
            Ok(buf) => buf,
            Err(e) => {
                error!("Failed to create buffer {}x{}: {}", width, height, e);
                return;
            }
        };

        canvas.fill(0);
        if visible {
            Self::render_transformed(&self.image, canvas, width, height, &transform, alpha);
        }

        let layer = self.image_layer.as_ref().unwrap();
        let surface = layer.wl_surface();
        if let Err(e) = buffer.attach_to(surface) {
            error!("Failed to attach buffer: {}", e);
            return;
        }
        surface.damage_buffer(0, 0, width as i32, height as i32);
        surface.commit();

        self.image_buffer = Some(buffer);
        self.needs_redraw = false;
    }

    /// Nearest-neighbor rendering of the image under its current pose: fit to
    /// the surface, then user scale, rotation and translation about the
    /// surface center. Walks output pixels and inverse-maps into the source.
    fn render_transformed(
        image: &ImageData,
        canvas: &mut [u8],
        width: u32,
        height: u32,
        transform: &TransformState,
        opacity: f32,
    ) {
        if image.width == 0 || image.height == 0 {
            return;
        }

        let fit = (width as f32 / image.width as f32).min(height as f32 / image.height as f32);
        let total = fit * transform.scale;
        if total <= 0.0 {
            return;
        }

        // Pick a mipmap level when heavily downscaled
        let (img_width, img_height, src_data) = if total < 0.5 && !image.mipmaps.is_empty() {
            let mut best_level = 0;
            for (i, mipmap) in image.mipmaps.iter().enumerate() {
                let mip_scale = mipmap.width as f32 / image.width as f32;
                if mip_scale >= total * 0.75 {
                    best_level = i;
                    break;
                }
                best_level = i;
            }
            let mipmap = &image.mipmaps[best_level];
            (mipmap.width, mipmap.height, &mipmap.data[..])
        } else {
            (image.width, image.height, &image.bgra_data[..])
        };

        // Source pixels per screen pixel, at the chosen level's resolution
        let inv_scale = (img_width as f32 / image.width as f32) / total;

        let theta = transform.rotation_deg.to_radians();
        let (sin, cos) = theta.sin_cos();
        // Inverse rotation folded with the inverse scale
        let ax = cos * inv_scale;
        let ay = sin * inv_scale;

        let center_x = width as f32 / 2.0 + transform.translation.0;
        let center_y = height as f32 / 2.0 + transform.translation.1;
        let src_cx = img_width as f32 / 2.0;
        let src_cy = img_height as f32 / 2.0;

        let opacity_i = (opacity.clamp(0.0, 1.0) * 255.0) as u32;
        let img_stride = (img_width * 4) as usize;

        for y in 0..height {
            let dy = y as f32 + 0.5 - center_y;
            let dx0 = 0.5 - center_x;
            // Source coordinates at x=0, stepped incrementally per column
            let mut sx = dx0 * ax + dy * ay + src_cx;
            let mut sy = -dx0 * ay + dy * ax + src_cy;
            let dst_row = (y * width * 4) as usize;

            for x in 0..width {
                let fx = sx;
                let fy = sy;
                sx += ax;
                sy -= ay;

                // The cast truncates toward zero, so negatives must be
                // rejected before it
                if fx < 0.0 || fy < 0.0 {
                    continue;
                }
                let src_x = fx as u32;
                let src_y = fy as u32;
                if src_x >= img_width || src_y >= img_height {
                    continue;
                }

                let src_idx = src_y as usize * img_stride + src_x as usize * 4;
                let dst_idx = dst_row + (x * 4) as usize;
                if src_idx + 3 < src_data.len() && dst_idx + 3 < canvas.len() {
                    let src_alpha = src_data[src_idx + 3] as u32;
                    canvas[dst_idx] = src_data[src_idx];
                    canvas[dst_idx + 1] = src_data[src_idx + 1];
                    canvas[dst_idx + 2] = src_data[src_idx + 2];
                    canvas[dst_idx + 3] = ((src_alpha * opacity_i) >> 8) as u8;
                }
            }
        }
    }

    /// Draw the floating control: a filled circle with a state dot
    fn draw_fab(&mut self) {
        let Some(ref layer) = self.fab_layer else {
            return;
        };

        let size = FAB_SIZE;
        let stride = size as i32 * 4;
        let buffer_size = (stride * size as i32) as usize;

        if self.fab_pool.is_none() {
            match SlotPool::new(buffer_size, &self.shm) {
                Ok(pool) => self.fab_pool = Some(pool),
                Err(e) => {
                    error!("Failed to create FAB pool: {}", e);
                    return;
                }
            }
        }
        let pool = self.fab_pool.as_mut().unwrap();

        let (buffer, canvas) =
            match pool.create_buffer(size as i32, size as i32, stride, wl_shm::Format::Argb8888) {
                Ok(buf) => buf,
                Err(e) => {
                    error!("Failed to create FAB buffer: {}", e);
                    return;
                }
            };

        canvas.fill(0);
        let center = size as f32 / 2.0;
        let radius = center - 2.0;
        let body: [u8; 4] = [160, 110, 40, 235]; // BGRA
        let dot: [u8; 4] = if self.session.image_visible() {
            [255, 255, 255, 255]
        } else {
            [90, 90, 90, 255]
        };
        for y in 0..size {
            for x in 0..size {
                let dx = x as f32 + 0.5 - center;
                let dy = y as f32 + 0.5 - center;
                let dist = (dx * dx + dy * dy).sqrt();
                let idx = ((y * size + x) * 4) as usize;
                let color = if dist <= radius / 3.0 {
                    Some(dot)
                } else if dist <= radius {
                    Some(body)
                } else {
                    None
                };
                if let Some(c) = color {
                    canvas[idx..idx + 4].copy_from_slice(&c);
                }
            }
        }

        let surface = layer.wl_surface();
        if let Err(e) = buffer.attach_to(surface) {
            error!("Failed to attach FAB buffer: {}", e);
            return;
        }
        surface.damage_buffer(0, 0, size as i32, size as i32);
        surface.commit();
        self.fab_buffer = Some(buffer);
        self.fab_mapped = true;
    }

    /// Draw the control panel rows
    fn draw_panel(&mut self) {
        let Some(ref layer) = self.panel_layer else {
            return;
        };
        let rows = self.panel_rows();

        let width = PANEL_WIDTH;
        let height = PANEL_ROWS * PANEL_ROW_HEIGHT;
        let stride = width as i32 * 4;
        let buffer_size = (stride * height as i32) as usize;

        if self.panel_pool.is_none() {
            match SlotPool::new(buffer_size, &self.shm) {
                Ok(pool) => self.panel_pool = Some(pool),
                Err(e) => {
                    error!("Failed to create panel pool: {}", e);
                    return;
                }
            }
        }
        let pool = self.panel_pool.as_mut().unwrap();

        let (buffer, canvas) = match pool.create_buffer(
            width as i32,
            height as i32,
            stride,
            wl_shm::Format::Argb8888,
        ) {
            Ok(buf) => buf,
            Err(e) => {
                error!("Failed to create panel buffer: {}", e);
                return;
            }
        };

        Self::render_panel_static(canvas, width, height, &rows);

        let surface = layer.wl_surface();
        if let Err(e) = buffer.attach_to(surface) {
            error!("Failed to attach panel buffer: {}", e);
            return;
        }
        surface.damage_buffer(0, 0, width as i32, height as i32);
        surface.commit();
        self.panel_buffer = Some(buffer);
    }

    /// Render the panel rows (static version to avoid borrow issues)
    fn render_panel_static(canvas: &mut [u8], canvas_width: u32, canvas_height: u32, rows: &[&str]) {
        let bg_color: [u8; 4] = [60, 60, 60, 230]; // BGRA dark gray
        let border_color: [u8; 4] = [100, 100, 100, 255];

        for (i, label) in rows.iter().enumerate() {
            let row_y = i as u32 * PANEL_ROW_HEIGHT;

            for y in row_y..(row_y + PANEL_ROW_HEIGHT).min(canvas_height) {
                for x in 0..canvas_width {
                    let idx = ((y * canvas_width + x) * 4) as usize;
                    if idx + 3 < canvas.len() {
                        canvas[idx..idx + 4].copy_from_slice(&bg_color);
                    }
                }
            }

            let text_y = row_y + 6;
            Self::draw_text_static(
                canvas,
                canvas_width,
                canvas_height,
                10,
                text_y,
                label,
                [255, 255, 255, 255],
            );
        }

        // Border
        for x in 0..canvas_width {
            for &y in &[0, canvas_height - 1] {
                let idx = ((y * canvas_width + x) * 4) as usize;
                if idx + 3 < canvas.len() {
                    canvas[idx..idx + 4].copy_from_slice(&border_color);
                }
            }
        }
        for y in 0..canvas_height {
            for &x in &[0, canvas_width - 1] {
                let idx = ((y * canvas_width + x) * 4) as usize;
                if idx + 3 < canvas.len() {
                    canvas[idx..idx + 4].copy_from_slice(&border_color);
                }
            }
        }
    }

    /// Draw simple text (basic 5x7 pixel font) - static version
    fn draw_text_static(
        canvas: &mut [u8],
        canvas_width: u32,
        canvas_height: u32,
        x: u32,
        y: u32,
        text: &str,
        color: [u8; 4],
    ) {
        // Simple bitmap font data for the characters the panel uses
        let font: std::collections::HashMap<char, [[u8; 5]; 7]> = [
            ('B', [
                [1,1,1,0,0],
                [1,0,0,1,0],
                [1,0,0,1,0],
                [1,1,1,0,0],
                [1,0,0,1,0],
                [1,0,0,1,0],
                [1,1,1,0,0],
            ]),
            ('C', [
                [0,1,1,1,0],
                [1,0,0,0,1],
                [1,0,0,0,0],
                [1,0,0,0,0],
                [1,0,0,0,0],
                [1,0,0,0,1],
                [0,1,1,1,0],
            ]),
            ('L', [
                [1,0,0,0,0],
                [1,0,0,0,0],
                [1,0,0,0,0],
                [1,0,0,0,0],
                [1,0,0,0,0],
                [1,0,0,0,0],
                [1,1,1,1,0],
            ]),
            ('O', [
                [0,1,1,1,0],
                [1,0,0,0,1],
                [1,0,0,0,1],
                [1,0,0,0,1],
                [1,0,0,0,1],
                [1,0,0,0,1],
                [0,1,1,1,0],
            ]),
            ('a', [
                [0,0,0,0,0],
                [0,0,0,0,0],
                [0,1,1,1,0],
                [0,0,0,0,1],
                [0,1,1,1,1],
                [1,0,0,0,1],
                [0,1,1,1,1],
            ]),
            ('c', [
                [0,0,0,0,0],
                [0,0,0,0,0],
                [0,1,1,1,0],
                [1,0,0,0,0],
                [1,0,0,0,0],
                [1,0,0,0,0],
                [0,1,1,1,0],
            ]),
            ('e', [
                [0,0,0,0,0],
                [0,0,0,0,0],
                [0,1,1,0,0],
                [1,0,0,1,0],
                [1,1,1,1,0],
                [1,0,0,0,0],
                [0,1,1,1,0],
            ]),
            ('f', [
                [0,0,1,1,0],
                [0,1,0,0,0],
                [1,1,1,0,0],
                [0,1,0,0,0],
                [0,1,0,0,0],
                [0,1,0,0,0],
                [0,1,0,0,0],
            ]),
            ('i', [
                [0,1,0,0,0],
                [0,0,0,0,0],
                [1,1,0,0,0],
                [0,1,0,0,0],
                [0,1,0,0,0],
                [0,1,0,0,0],
                [1,1,1,0,0],
            ]),
            ('k', [
                [1,0,0,0,0],
                [1,0,0,0,0],
                [1,0,0,1,0],
                [1,0,1,0,0],
                [1,1,0,0,0],
                [1,0,1,0,0],
                [1,0,0,1,0],
            ]),
            ('l', [
                [1,0,0,0,0],
                [1,0,0,0,0],
                [1,0,0,0,0],
                [1,0,0,0,0],
                [1,0,0,0,0],
                [1,0,0,0,0],
                [1,1,1,0,0],
            ]),
            ('n', [
                [0,0,0,0,0],
                [0,0,0,0,0],
                [1,1,1,0,0],
                [1,0,0,1,0],
                [1,0,0,1,0],
                [1,0,0,1,0],
                [1,0,0,1,0],
            ]),
            ('o', [
                [0,0,0,0,0],
                [0,0,0,0,0],
                [0,1,1,1,0],
                [1,0,0,0,1],
                [1,0,0,0,1],
                [1,0,0,0,1],
                [0,1,1,1,0],
            ]),
            ('p', [
                [0,0,0,0,0],
                [0,0,0,0,0],
                [1,1,1,1,0],
                [1,0,0,0,1],
                [1,1,1,1,0],
                [1,0,0,0,0],
                [1,0,0,0,0],
            ]),
            ('s', [
                [0,0,0,0,0],
                [0,0,0,0,0],
                [0,1,1,1,0],
                [1,0,0,0,0],
                [0,1,1,0,0],
                [0,0,0,1,0],
                [1,1,1,0,0],
            ]),
            ('t', [
                [0,1,0,0,0],
                [0,1,0,0,0],
                [1,1,1,0,0],
                [0,1,0,0,0],
                [0,1,0,0,0],
                [0,1,0,0,0],
                [0,0,1,1,0],
            ]),
            ('y', [
                [0,0,0,0,0],
                [0,0,0,0,0],
                [1,0,0,0,1],
                [1,0,0,0,1],
                [0,1,1,1,1],
                [0,0,0,0,1],
                [0,1,1,1,0],
            ]),
            (':', [
                [0,0,0,0,0],
                [0,1,0,0,0],
                [0,0,0,0,0],
                [0,0,0,0,0],
                [0,1,0,0,0],
                [0,0,0,0,0],
                [0,0,0,0,0],
            ]),
            ('+', [
                [0,0,0,0,0],
                [0,0,1,0,0],
                [0,0,1,0,0],
                [1,1,1,1,1],
                [0,0,1,0,0],
                [0,0,1,0,0],
                [0,0,0,0,0],
            ]),
            ('-', [
                [0,0,0,0,0],
                [0,0,0,0,0],
                [0,0,0,0,0],
                [1,1,1,1,1],
                [0,0,0,0,0],
                [0,0,0,0,0],
                [0,0,0,0,0],
            ]),
            (' ', [
                [0,0,0,0,0],
                [0,0,0,0,0],
                [0,0,0,0,0],
                [0,0,0,0,0],
                [0,0,0,0,0],
                [0,0,0,0,0],
                [0,0,0,0,0],
            ]),
        ]
        .iter()
        .cloned()
        .collect();

        let mut cx = x;
        for ch in text.chars() {
            if let Some(glyph) = font.get(&ch) {
                for (row, line) in glyph.iter().enumerate() {
                    for (col, &pixel) in line.iter().enumerate() {
                        if pixel == 1 {
                            let px = cx + col as u32;
                            let py = y + row as u32;
                            if px < canvas_width && py < canvas_height {
                                let idx = ((py * canvas_width + px) * 4) as usize;
                                if idx + 3 < canvas.len() {
                                    canvas[idx] = color[0];
                                    canvas[idx + 1] = color[1];
                                    canvas[idx + 2] = color[2];
                                    canvas[idx + 3] = color[3];
                                }
                            }
                        }
                    }
                }
            }
            cx += 6; // Character width + spacing
        }
    }
}

// Implement required traits for smithay-client-toolkit

impl CompositorHandler for WaylandApp {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_factor: i32,
    ) {
        debug!("Scale factor changed");
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_transform: wl_output::Transform,
    ) {
        debug!("Transform changed");
    }

    fn frame(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        surface: &wl_surface::WlSurface,
        _time: u32,
    ) {
        if self.needs_redraw && self.role_of(surface) == Some(SurfaceRole::Image) {
            self.draw_image(qh);
        }
    }

    fn surface_enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }

    fn surface_leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }
}

impl OutputHandler for WaylandApp {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("New output detected");
    }

    fn update_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("Output updated");
    }

    fn output_destroyed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("Output destroyed");
    }
}

impl LayerShellHandler for WaylandApp {
    fn closed(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, layer: &LayerSurface) {
        match self.role_of(layer.wl_surface()) {
            Some(SurfaceRole::Image) | None => {
                info!("Layer surface closed");
                self.should_exit = true;
            }
            Some(SurfaceRole::Fab) => {
                self.fab_layer = None;
                self.fab_mapped = false;
            }
            Some(SurfaceRole::Panel) => {
                self.panel_layer = None;
                self.panel_buffer = None;
                self.panel_pool = None;
            }
        }
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        layer: &LayerSurface,
        configure: LayerSurfaceConfigure,
        _serial: u32,
    ) {
        debug!("Layer surface configured: {:?}", configure);
        match self.role_of(layer.wl_surface()) {
            Some(SurfaceRole::Image) => {
                self.width = if configure.new_size.0 > 0 {
                    configure.new_size.0
                } else {
                    self.display_width
                };
                self.height = if configure.new_size.1 > 0 {
                    configure.new_size.1
                } else {
                    self.display_height
                };
                self.configured = true;

                // Record the layout with the session; this also pushes the
                // initial touchability (locked: empty input region)
                let mut sink = ImageWindowSink {
                    layer: self.image_layer.as_ref(),
                    compositor: &self.compositor_state,
                    dirty: false,
                };
                self.session.set_layout(
                    (self.width, self.height),
                    (self.image.width, self.image.height),
                    (0, 0),
                    &mut sink,
                );

                if self.use_gpu && !self.gpu_initialized {
                    self.init_gpu_renderer();
                }
                self.needs_redraw = true;
                self.draw_image(qh);
            }
            Some(SurfaceRole::Fab) => {
                if self.session.fab_visible() {
                    self.draw_fab();
                }
            }
            Some(SurfaceRole::Panel) => {
                self.draw_panel();
            }
            None => {}
        }
    }
}

impl SeatHandler for WaylandApp {
    fn seat_state(&mut self) -> &mut SeatState {
        &mut self.seat_state
    }

    fn new_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {
        debug!("New seat");
    }

    fn new_capability(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        seat: wl_seat::WlSeat,
        capability: Capability,
    ) {
        debug!("New capability: {:?}", capability);

        if capability == Capability::Keyboard {
            if let Err(e) = self.seat_state.get_keyboard(qh, &seat, None) {
                error!("Failed to get keyboard: {}", e);
            }
        }
        if capability == Capability::Pointer {
            if let Err(e) = self.seat_state.get_pointer(qh, &seat) {
                error!("Failed to get pointer: {}", e);
            }
        }
        if capability == Capability::Touch {
            if let Err(e) = self.seat_state.get_touch(qh, &seat) {
                error!("Failed to get touch: {}", e);
            }
        }
    }

    fn remove_capability(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _seat: wl_seat::WlSeat,
        _capability: Capability,
    ) {
        debug!("Capability removed");
    }

    fn remove_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {
        debug!("Seat removed");
    }
}

impl KeyboardHandler for WaylandApp {
    fn enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _surface: &wl_surface::WlSurface,
        _serial: u32,
        _raw: &[u32],
        _keysyms: &[Keysym],
    ) {
        debug!("Keyboard entered surface");
    }

    fn leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _surface: &wl_surface::WlSurface,
        _serial: u32,
    ) {
        debug!("Keyboard left surface");
    }

    fn press_key(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        event: KeyEvent,
    ) {
        debug!("Key pressed: {:?}", event.keysym);

        // Close on Escape or Q key (panel surface has keyboard focus)
        if event.keysym == Keysym::Escape || event.keysym == Keysym::q {
            info!("Exit key pressed");
            self.should_exit = true;
        }
    }

    fn release_key(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        _event: KeyEvent,
    ) {
    }

    fn update_modifiers(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        _modifiers: Modifiers,
        _layout: u32,
    ) {
    }
}

impl PointerHandler for WaylandApp {
    fn pointer_frame(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        _pointer: &wl_pointer::WlPointer,
        events: &[PointerEvent],
    ) {
        for event in events {
            let role = self.role_of(&event.surface);
            match event.kind {
                PointerEventKind::Enter { .. } => {
                    self.pointer_pos = event.position;
                    self.pointer_role = role;
                }
                PointerEventKind::Leave { .. } => {
                    match role {
                        Some(SurfaceRole::Image) if self.image_mouse_down => {
                            self.image_event(PointerPhase::Cancel, 0, Vec::new());
                            self.image_mouse_down = false;
                        }
                        Some(SurfaceRole::Fab) if self.fab_mouse_down => {
                            self.session.fab_cancel();
                            self.fab_mouse_down = false;
                            self.fab_press = None;
                        }
                        _ => {}
                    }
                    self.pointer_role = None;
                }
                PointerEventKind::Motion { time } => {
                    self.pointer_pos = event.position;
                    self.pointer_role = role;
                    match role {
                        Some(SurfaceRole::Image) if self.image_mouse_down => {
                            let sample = PointerSample {
                                id: 0,
                                x: event.position.0 as f32,
                                y: event.position.1 as f32,
                            };
                            self.image_event(PointerPhase::Move, time, vec![sample]);
                        }
                        Some(SurfaceRole::Fab) if self.fab_mouse_down => {
                            let raw = self.fab_raw(event.position);
                            let mut sink = ImageWindowSink {
                                layer: self.image_layer.as_ref(),
                                compositor: &self.compositor_state,
                                dirty: false,
                            };
                            let fired = self.session.fab_move(time, raw, &mut sink);
                            self.needs_redraw |= sink.dirty;
                            self.update_fab_position();
                            if fired.is_some() {
                                self.sync_controls(qh);
                            }
                        }
                        _ => {}
                    }
                }
                PointerEventKind::Press { button, time, .. } => {
                    if button != BTN_LEFT {
                        continue;
                    }
                    match role.or(self.pointer_role) {
                        Some(SurfaceRole::Image) => {
                            let sample = PointerSample {
                                id: 0,
                                x: self.pointer_pos.0 as f32,
                                y: self.pointer_pos.1 as f32,
                            };
                            self.image_mouse_down = true;
                            self.image_event(PointerPhase::Down, time, vec![sample]);
                        }
                        Some(SurfaceRole::Fab) => {
                            let raw = self.fab_raw(self.pointer_pos);
                            self.fab_mouse_down = true;
                            self.fab_press = Some((Instant::now(), time));
                            self.session.fab_down(time, raw);
                        }
                        Some(SurfaceRole::Panel) => {
                            if let Some(cmd) = self.panel_command_at(self.pointer_pos.1) {
                                self.apply_panel_command(cmd, qh);
                            }
                        }
                        None => {}
                    }
                }
                PointerEventKind::Release { button, time, .. } => {
                    if button != BTN_LEFT {
                        continue;
                    }
                    if self.image_mouse_down {
                        self.image_mouse_down = false;
                        self.image_event(PointerPhase::Up, time, Vec::new());
                    }
                    if self.fab_mouse_down {
                        self.fab_mouse_down = false;
                        self.fab_press = None;
                        let mut sink = ImageWindowSink {
                            layer: self.image_layer.as_ref(),
                            compositor: &self.compositor_state,
                            dirty: false,
                        };
                        let fired = self.session.fab_up(time, &mut sink);
                        self.needs_redraw |= sink.dirty;
                        if fired.is_some() {
                            self.needs_redraw = true;
                            self.sync_controls(qh);
                            self.draw_fab();
                        }
                    }
                }
                PointerEventKind::Axis { vertical, .. } => {
                    // Scroll on the image (only deliverable while Editing)
                    // nudges opacity like the panel rows do
                    if role == Some(SurfaceRole::Image) && vertical.absolute != 0.0 {
                        let percent = (self.session.mode().opacity() * 100.0).round() as i32;
                        let step = if vertical.absolute > 0.0 {
                            -OPACITY_STEP_PERCENT
                        } else {
                            OPACITY_STEP_PERCENT
                        };
                        self.apply_panel_command(PanelCommand::OpacityChanged(percent + step), qh);
                    }
                }
            }
        }
        self.poll_fab(qh);
        if self.needs_redraw {
            self.draw_image(qh);
        }
    }
}

impl TouchHandler for WaylandApp {
    fn down(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        _touch: &wl_touch::WlTouch,
        _serial: u32,
        time: u32,
        surface: wl_surface::WlSurface,
        id: i32,
        position: (f64, f64),
    ) {
        let Some(role) = self.role_of(&surface) else {
            return;
        };
        self.touch_points.push(TouchPoint {
            id,
            role,
            x: position.0,
            y: position.1,
        });
        match role {
            SurfaceRole::Image => {
                let phase = if self.image_touch_count() == 1 {
                    PointerPhase::Down
                } else {
                    PointerPhase::PointerDown
                };
                let samples = self.image_touch_samples();
                self.image_event(phase, time, samples);
            }
            SurfaceRole::Fab => {
                if self.fab_touch_id.is_none() {
                    self.fab_touch_id = Some(id);
                    self.fab_press = Some((Instant::now(), time));
                    let raw = self.fab_raw(position);
                    self.session.fab_down(time, raw);
                }
            }
            SurfaceRole::Panel => {
                if let Some(cmd) = self.panel_command_at(position.1) {
                    self.apply_panel_command(cmd, qh);
                }
            }
        }
        if self.needs_redraw {
            self.draw_image(qh);
        }
    }

    fn up(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        _touch: &wl_touch::WlTouch,
        _serial: u32,
        time: u32,
        id: i32,
    ) {
        let Some(index) = self.touch_points.iter().position(|p| p.id == id) else {
            return;
        };
        let point = self.touch_points.remove(index);
        match point.role {
            SurfaceRole::Image => {
                let phase = if self.image_touch_count() > 0 {
                    PointerPhase::PointerUp
                } else {
                    PointerPhase::Up
                };
                let samples = self.image_touch_samples();
                self.image_event(phase, time, samples);
            }
            SurfaceRole::Fab => {
                if self.fab_touch_id == Some(id) {
                    self.fab_touch_id = None;
                    self.fab_press = None;
                    let mut sink = ImageWindowSink {
                        layer: self.image_layer.as_ref(),
                        compositor: &self.compositor_state,
                        dirty: false,
                    };
                    let fired = self.session.fab_up(time, &mut sink);
                    self.needs_redraw |= sink.dirty;
                    if fired.is_some() {
                        self.needs_redraw = true;
                        self.sync_controls(qh);
                        self.draw_fab();
                    }
                }
            }
            SurfaceRole::Panel => {}
        }
        if self.needs_redraw {
            self.draw_image(qh);
        }
    }

    fn motion(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        _touch: &wl_touch::WlTouch,
        time: u32,
        id: i32,
        position: (f64, f64),
    ) {
        let Some(point) = self.touch_points.iter_mut().find(|p| p.id == id) else {
            return;
        };
        point.x = position.0;
        point.y = position.1;
        let role = point.role;
        match role {
            SurfaceRole::Image => {
                let samples = self.image_touch_samples();
                self.image_event(PointerPhase::Move, time, samples);
            }
            SurfaceRole::Fab => {
                if self.fab_touch_id == Some(id) {
                    let raw = self.fab_raw(position);
                    let mut sink = ImageWindowSink {
                        layer: self.image_layer.as_ref(),
                        compositor: &self.compositor_state,
                        dirty: false,
                    };
                    let fired = self.session.fab_move(time, raw, &mut sink);
                    self.needs_redraw |= sink.dirty;
                    self.update_fab_position();
                    if fired.is_some() {
                        self.sync_controls(qh);
                    }
                }
            }
            SurfaceRole::Panel => {}
        }
        self.poll_fab(qh);
        if self.needs_redraw {
            self.draw_image(qh);
        }
    }

    fn shape(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _touch: &wl_touch::WlTouch,
        _id: i32,
        _major: f64,
        _minor: f64,
    ) {
    }

    fn orientation(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _touch: &wl_touch::WlTouch,
        _id: i32,
        _orientation: f64,
    ) {
    }

    fn cancel(&mut self, _conn: &Connection, qh: &QueueHandle<Self>, _touch: &wl_touch::WlTouch) {
        debug!("Touch sequence cancelled");
        let had_image_touches = self.image_touch_count() > 0;
        self.touch_points.clear();
        if had_image_touches {
            self.image_event(PointerPhase::Cancel, 0, Vec::new());
        }
        if self.fab_touch_id.take().is_some() {
            self.fab_press = None;
            self.session.fab_cancel();
        }
        if self.needs_redraw {
            self.draw_image(qh);
        }
    }
}

impl ShmHandler for WaylandApp {
    fn shm_state(&mut self) -> &mut Shm {
        &mut self.shm
    }
}

impl ProvidesRegistryState for WaylandApp {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }

    registry_handlers![OutputState, SeatState];
}

// Delegate macros
delegate_compositor!(WaylandApp);
delegate_output!(WaylandApp);
delegate_layer!(WaylandApp);
delegate_seat!(WaylandApp);
delegate_keyboard!(WaylandApp);
delegate_pointer!(WaylandApp);
delegate_touch!(WaylandApp);
delegate_shm!(WaylandApp);
delegate_registry!(WaylandApp);

/// Run the overlay until the user closes it from the panel
pub fn run(
    image: ImageData,
    params: SessionParams,
    fab_position: (i32, i32),
    use_gpu: bool,
) -> Result<()> {
    info!("Connecting to Wayland display");

    let conn = Connection::connect_to_env().context("Failed to connect to Wayland display")?;

    let (globals, mut event_queue) =
        registry_queue_init(&conn).context("Failed to initialize registry")?;
    let qh = event_queue.handle();

    let compositor_state =
        CompositorState::bind(&globals, &qh).context("Failed to bind compositor")?;
    let layer_shell = LayerShell::bind(&globals, &qh).context("Failed to bind layer shell")?;
    let shm = Shm::bind(&globals, &qh).context("Failed to bind shm")?;

    // Get the display pointer for GPU rendering
    let display_ptr = conn.backend().display_ptr() as *mut std::ffi::c_void;

    let session = OverlaySession::start(&params, fab_position)?;

    let mut app = WaylandApp::new(
        RegistryState::new(&globals),
        SeatState::new(&globals, &qh),
        OutputState::new(&globals, &qh),
        shm,
        layer_shell,
        compositor_state,
        display_ptr,
        image,
        session,
        use_gpu,
    );

    // Dispatch once to get output info
    event_queue.roundtrip(&mut app)?;

    let (display_width, display_height) = get_display_dimensions(&app.output_state);
    app.display_width = display_width;
    app.display_height = display_height;
    info!("Display dimensions: {}x{}", display_width, display_height);

    // Fullscreen image surface; the compositor assigns the actual size
    let surface = app.compositor_state.create_surface(&qh);
    let image_layer = app.layer_shell.create_layer_surface(
        &qh,
        surface,
        Layer::Overlay,
        Some("rghost"),
        None,
    );
    image_layer.set_anchor(Anchor::TOP | Anchor::BOTTOM | Anchor::LEFT | Anchor::RIGHT);
    image_layer.set_exclusive_zone(-1);
    image_layer.set_size(0, 0);
    image_layer.set_keyboard_interactivity(KeyboardInteractivity::None);
    image_layer.commit();
    app.image_layer = Some(image_layer);

    // The floating control, anchored by its margins
    let surface = app.compositor_state.create_surface(&qh);
    let fab_layer = app.layer_shell.create_layer_surface(
        &qh,
        surface,
        Layer::Overlay,
        Some("rghost-fab"),
        None,
    );
    fab_layer.set_anchor(Anchor::TOP | Anchor::LEFT);
    fab_layer.set_margin(fab_position.1, 0, 0, fab_position.0);
    fab_layer.set_size(FAB_SIZE, FAB_SIZE);
    fab_layer.set_keyboard_interactivity(KeyboardInteractivity::None);
    fab_layer.commit();
    app.fab_layer = Some(fab_layer);

    info!("Starting event loop");
    info!("Controls: tap the floating button to hide/show, hold it for the panel");

    loop {
        event_queue.blocking_dispatch(&mut app)?;
        app.poll_fab(&qh);

        if app.should_exit {
            info!("Exiting application");
            break;
        }
    }

    app.session.stop();
    Ok(())
}

/// Get display dimensions from the output state
fn get_display_dimensions(output_state: &OutputState) -> (u32, u32) {
    for output in output_state.outputs() {
        if let Some(info) = output_state.info(&output) {
            if let Some(mode) = info.modes.iter().find(|m| m.current) {
                return (mode.dimensions.0 as u32, mode.dimensions.1 as u32);
            }
            if let Some(mode) = info.modes.first() {
                return (mode.dimensions.0 as u32, mode.dimensions.1 as u32);
            }
        }
    }
    (1920, 1080)
}
