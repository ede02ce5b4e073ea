pub mod cache;
pub mod clock;
pub mod credential;
pub mod dice;
pub mod notify;
pub mod pipeline;
pub mod roller;
pub mod runtime;
pub mod settings;
pub mod source;
pub mod toggle;
pub mod utils;

pub use runtime::TrueRng;

pub mod prelude {
    pub use crate::{
        TrueRng,
        cache::{Availability, FallbackReason, FillPolicy, SupplyCache, clamp_positive},
        clock::{Clock, FixedClock, SystemClock},
        credential::{
            API_KEY_ENTRY, CredentialStore, FileCredentialStore, MemoryCredentialStore,
            reconcile_credential,
        },
        dice::{DiceFormula, Roll},
        notify::{LogNotifier, Notifier},
        pipeline::{DrawFn, DrawPipeline, PostDraw, PreDraw},
        roller::Roller,
        runtime::{SourceFactory, random_org_factory},
        settings::{SettingChange, Settings, SettingsError},
        source::{
            ApiKey, DECIMAL_PLACES, FetchResult, PendingFetch, RandomSource, SourceError,
            random_org::RandomOrgSource,
        },
        toggle::{QuickToggle, ToggleState},
        utils::ExchangeCell,
    };
}
