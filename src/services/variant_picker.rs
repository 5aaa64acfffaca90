use crate::models::VariantLike;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// Key of the "no variant" choice
pub const NO_VARIANT_KEY: &str = "none";

/// One row of the variant sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantAction {
    pub name: String,
    pub key: String,
    pub variant: Option<VariantLike>,
}

impl VariantAction {
    fn none() -> Self {
        Self {
            name: "No variant".to_string(),
            key: NO_VARIANT_KEY.to_string(),
            variant: None,
        }
    }

    fn for_variant(variant: &VariantLike) -> Self {
        let name = match &variant.variant_sku {
            Some(sku) if !sku.is_empty() => format!("{} ({})", variant.variant_name, sku),
            _ => variant.variant_name.clone(),
        };
        Self {
            name,
            key: format!("v:{}", variant.id),
            variant: Some(variant.clone()),
        }
    }
}

/// What the host should render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantSheet {
    pub show: bool,
    pub actions: Vec<VariantAction>,
}

#[derive(Default)]
struct PickerState {
    sheet: VariantSheet,
    pending: Option<oneshot::Sender<Option<VariantAction>>>,
    closed: bool,
}

/// Ask the user to choose a product variant and await the answer.
///
/// [`pick()`](Self::pick) fills and shows the sheet and returns a future that
/// resolves on [`select()`](Self::select) or [`cancel()`](Self::cancel).
/// Starting a new pick resolves an unanswered one with `None`. After
/// [`close()`](Self::close) every pick resolves with `None` at once.
#[derive(Default)]
pub struct VariantPicker {
    state: Mutex<PickerState>,
}

impl VariantPicker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PickerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn pick(
        &self,
        variants: &[VariantLike],
    ) -> impl Future<Output = Option<VariantAction>> + Send + 'static {
        let (tx, rx) = oneshot::channel();

        let mut state = self.lock();
        if !state.closed {
            state.sheet.actions = std::iter::once(VariantAction::none())
                .chain(variants.iter().map(VariantAction::for_variant))
                .collect();
            state.sheet.show = true;
            if let Some(previous) = state.pending.replace(tx) {
                let _ = previous.send(None);
            }
        }
        drop(state);

        // When closed, `tx` is dropped unsent and this resolves to `None`
        async move { rx.await.ok().flatten() }
    }

    pub fn select(&self, action: VariantAction) {
        self.resolve(Some(action));
    }

    pub fn cancel(&self) {
        self.resolve(None);
    }

    /// Cancel the pending pick and refuse new ones. Used when input ends.
    pub fn close(&self) {
        self.lock().closed = true;
        self.cancel();
    }

    pub fn sheet(&self) -> VariantSheet {
        self.lock().sheet.clone()
    }

    fn resolve(&self, choice: Option<VariantAction>) {
        let mut state = self.lock();
        state.sheet.show = false;
        if let Some(tx) = state.pending.take() {
            let _ = tx.send(choice);
        }
    }
}
