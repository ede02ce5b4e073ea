use crate::{
    cache::{Availability, SupplyCache},
    utils::ExchangeCell,
};

/// The routine that will produce the value for the current draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawFn {
    /// Select and remove a buffered true random value.
    Buffer,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreDraw {
    Proceed,
    /// Bypass the true random buffer for this draw only.
    ForceFallback,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PostDraw {
    Keep,
    Override(f64),
}

pub type PreDrawHook = Box<dyn FnMut(&SupplyCache, &ExchangeCell<DrawFn>) -> PreDraw + Send>;
pub type PostDrawHook = Box<dyn FnMut(&SupplyCache, &ExchangeCell<f64>) -> PostDraw + Send>;

#[derive(Default)]
pub struct DrawPipeline {
    pre_draw: Option<PreDrawHook>,
    post_draw: Option<PostDrawHook>,
    last_value: Option<f64>,
}

impl std::fmt::Debug for DrawPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawPipeline")
            .field("pre_draw", &self.pre_draw.is_some())
            .field("post_draw", &self.post_draw.is_some())
            .field("last_value", &self.last_value)
            .finish()
    }
}

impl DrawPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pre_draw_hook<F>(&mut self, hook: F)
    where
        F: FnMut(&SupplyCache, &ExchangeCell<DrawFn>) -> PreDraw + Send + 'static,
    {
        if self.pre_draw.replace(Box::new(hook)).is_some() {
            log::debug!("Replaced pre-draw hook");
        }
    }

    pub fn set_post_draw_hook<F>(&mut self, hook: F)
    where
        F: FnMut(&SupplyCache, &ExchangeCell<f64>) -> PostDraw + Send + 'static,
    {
        if self.post_draw.replace(Box::new(hook)).is_some() {
            log::debug!("Replaced post-draw hook");
        }
    }

    pub fn clear_hooks(&mut self) {
        self.pre_draw = None;
        self.post_draw = None;
    }

    /// The most recently produced value, for diagnostics.
    pub fn last_value(&self) -> Option<f64> {
        self.last_value
    }

    pub fn draw(&mut self, cache: &mut SupplyCache) -> f64 {
        let value = match cache.availability() {
            Availability::Fallback(reason) => {
                log::trace!("Fallback draw: {reason:?}");
                cache.fallback()
            }
            Availability::Ready => self.intercepted_draw(cache),
        };
        self.last_value = Some(value);
        value
    }

    fn intercepted_draw(&mut self, cache: &mut SupplyCache) -> f64 {
        let mut draw_fn = ExchangeCell::new(DrawFn::Buffer);
        if let Some(hook) = self.pre_draw.as_mut() {
            match hook(&*cache, &draw_fn) {
                PreDraw::Proceed => {}
                PreDraw::ForceFallback => draw_fn.set(DrawFn::Fallback),
            }
        }

        let raw = match draw_fn.into_inner() {
            DrawFn::Buffer => cache.take(),
            DrawFn::Fallback => cache.fallback(),
        };
        cache.refill_if_low();

        let mut result = ExchangeCell::new(raw);
        if let Some(hook) = self.post_draw.as_mut()
            && let PostDraw::Override(value) = hook(&*cache, &result)
        {
            result.set(value);
        }
        result.into_inner()
    }
}
