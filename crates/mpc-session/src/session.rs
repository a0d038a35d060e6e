//! The mission session: the loaded mission and every operation on it.
//!
//! All mutating operations are queued on one [`Strand`], so a clone never
//! races a rename, however the calls are issued. Each returns a
//! [`TaskHandle`] resolving once the operation finished.

use crate::catalogue::MissionCatalogue;
use crate::config::SessionConfig;
use crate::dialog::{
    keys, ChangedItem, DialogService, EnglishLocalizer, Localizer, LogNotifier, NoScreenshots,
    Notifier, RenameRequest, SaveChangesKind, SaveChangesRequest, ScreenshotProvider, Toast,
};
use crate::error::{Result, SessionError};
use crate::mission::{Mission, UnsavedItem};
use crate::mission_info::MissionInfo;
use crate::strand::{Strand, TaskHandle};
use mpc_core::{DocumentLoader, JsonDocumentLoader, PlanningContext, Property, UiContext};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Collaborators injected into a session.
#[derive(Clone)]
pub struct Services {
    pub dialogs: Arc<dyn DialogService>,
    pub notifier: Arc<dyn Notifier>,
    pub localizer: Arc<dyn Localizer>,
    pub screenshots: Arc<dyn ScreenshotProvider>,
    pub loader: Arc<dyn DocumentLoader>,
}

impl Services {
    /// `dialogs` plus logging notifier, English messages, no screenshots
    /// and JSON flight plan files.
    pub fn new(dialogs: Arc<dyn DialogService>) -> Self {
        Self {
            dialogs,
            notifier: Arc::new(LogNotifier),
            localizer: Arc::new(EnglishLocalizer),
            screenshots: Arc::new(NoScreenshots),
            loader: Arc::new(JsonDocumentLoader),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_localizer(mut self, localizer: Arc<dyn Localizer>) -> Self {
        self.localizer = localizer;
        self
    }

    pub fn with_screenshots(mut self, screenshots: Arc<dyn ScreenshotProvider>) -> Self {
        self.screenshots = screenshots;
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = loader;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoMission,
    MissionLoaded,
}

struct SessionInner {
    catalogue: Arc<MissionCatalogue>,
    current: Property<Option<Mission>>,
    strand: Strand,
    ui: UiContext,
    services: Services,
}

/// Owner of the loaded mission. Clones share the same session.
#[derive(Clone)]
pub struct MissionSession {
    inner: Arc<SessionInner>,
}

impl MissionSession {
    /// Must be called within a tokio runtime; the UI loop behind
    /// `context.ui` has to be driven for operations to complete.
    pub fn new(config: &SessionConfig, context: PlanningContext, services: Services) -> Self {
        let catalogue = MissionCatalogue::new(
            config,
            context.clone(),
            services.loader.clone(),
            services.notifier.clone(),
            services.localizer.clone(),
            services.screenshots.clone(),
        );

        Self {
            inner: Arc::new(SessionInner {
                catalogue: Arc::new(catalogue),
                current: Property::new(None),
                strand: Strand::new(),
                ui: context.ui,
                services,
            }),
        }
    }

    pub fn catalogue(&self) -> &Arc<MissionCatalogue> {
        &self.inner.catalogue
    }

    /// Observable loaded mission; only written on the UI loop.
    pub fn current_mission_property(&self) -> &Property<Option<Mission>> {
        &self.inner.current
    }

    pub fn current_mission(&self) -> Option<Mission> {
        self.inner.current.get()
    }

    pub fn state(&self) -> SessionState {
        match self.current_mission() {
            Some(_) => SessionState::MissionLoaded,
            None => SessionState::NoMission,
        }
    }

    /// Operations queued or running.
    pub fn pending_tasks(&self) -> usize {
        self.inner.strand.depth()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.current_mission()
            .is_some_and(|mission| mission.has_unsaved_items())
    }

    /// Load a new mission unless one is loaded.
    pub fn ensure_mission(&self) -> TaskHandle<()> {
        let this = self.clone();
        self.inner.strand.run_later(async move {
            if this.current_mission().is_none() {
                this.load_new_internal().await?;
            }
            Ok(())
        })
    }

    pub fn load_new(&self) -> TaskHandle<Mission> {
        let this = self.clone();
        self.inner
            .strand
            .run_later(async move { this.load_new_internal().await })
    }

    /// Load the mission stored in `folder`.
    pub fn load(&self, folder: PathBuf) -> TaskHandle<Mission> {
        let this = self.clone();
        self.inner.strand.run_later(async move {
            let mission = this.inner.catalogue.open_mission(&folder)?;
            this.load_internal(mission.clone()).await?;
            Ok(mission)
        })
    }

    /// Clone `mission` and load the clone.
    pub fn load_cloned(&self, mission: Mission) -> TaskHandle<Mission> {
        let this = self.clone();
        self.inner.strand.run_later(async move {
            let clone = match this.inner.catalogue.clone_mission(&mission) {
                Ok(clone) => clone,
                Err(e) => {
                    error!(mission = %mission.name(), error = %e, "Cannot clone mission");
                    this.alert_io_error(&e);
                    return Err(e);
                }
            };
            this.load_internal(clone.clone()).await?;
            Ok(clone)
        })
    }

    /// Close the loaded mission after the save-changes workflow. Resolves to
    /// false when the user backed out.
    pub fn unload(&self) -> TaskHandle<bool> {
        let this = self.clone();
        self.inner
            .strand
            .run_later(async move { this.unload_internal().await })
    }

    /// Application shutdown. The mission stays loaded when it had nothing
    /// to save; resolves to false when the user backed out.
    pub fn close_on_exit(&self) -> TaskHandle<bool> {
        let this = self.clone();
        self.inner.strand.run_later(async move {
            let Some(mission) = this.current_mission() else {
                return Ok(true);
            };

            if mission.has_unsaved_items() {
                if !this.confirm_unsaved(SaveChangesKind::Close).await? {
                    return Ok(false);
                }
                this.release(&mission).await?;
            } else {
                this.finish_mission(&mission);
            }
            Ok(true)
        })
    }

    /// Rename `mission` after validating `new_name`.
    pub fn rename(&self, mission: Mission, new_name: String) -> TaskHandle<()> {
        let this = self.clone();
        self.inner.strand.run_later(async move {
            let catalogue = &this.inner.catalogue;
            if !catalogue.is_valid_mission_name(&new_name) {
                return Err(SessionError::InvalidName(new_name));
            }
            catalogue.rename_mission(&mission, &new_name)
        })
    }

    /// Ask for a new name of the loaded mission and apply it. Resolves to
    /// false when the demo mission was left unnamed.
    pub fn rename_current(&self) -> TaskHandle<bool> {
        let this = self.clone();
        self.inner
            .strand
            .run_later(async move { this.rename_current_internal().await })
    }

    /// Save every pending change of the loaded mission. The demo mission
    /// must be renamed first; resolves to false when that was declined.
    pub fn save(&self) -> TaskHandle<bool> {
        let this = self.clone();
        self.inner.strand.run_later(async move {
            let Some(mission) = this.current_mission() else {
                return Ok(true);
            };

            for item in mission.all_unsaved_items() {
                this.save_item(&mission, &item)?;
            }
            mission.save()?;

            if mission.is_demo() {
                return this.rename_current_internal().await;
            }
            Ok(true)
        })
    }

    pub fn refresh_missions(&self) -> TaskHandle<Vec<MissionInfo>> {
        let this = self.clone();
        self.inner
            .strand
            .run_later(async move { Ok(this.inner.catalogue.refresh()) })
    }

    async fn load_new_internal(&self) -> Result<Mission> {
        let mission = match self.inner.catalogue.create_new_mission() {
            Ok(mission) => mission,
            Err(e) => {
                error!(error = %e, "Cannot create mission");
                self.alert_io_error(&e);
                return Err(e);
            }
        };
        self.load_internal(mission.clone()).await?;
        Ok(mission)
    }

    async fn load_internal(&self, mission: Mission) -> Result<()> {
        let previous = self.current_mission();
        self.inner
            .catalogue
            .set_current(Some(mission.directory()));
        self.set_current(Some(mission.clone())).await?;

        if let Some(previous) = previous.filter(|previous| *previous != mission) {
            previous.dispose();
        }
        info!(mission = %mission.name(), "Mission loaded");
        Ok(())
    }

    async fn set_current(&self, mission: Option<Mission>) -> Result<()> {
        let current = self.inner.current.clone();
        self.inner
            .ui
            .invoke(move || {
                current.set(mission);
            })
            .await?;
        Ok(())
    }

    async fn unload_internal(&self) -> Result<bool> {
        let Some(mission) = self.current_mission() else {
            return Ok(true);
        };

        if mission.has_unsaved_items() && !self.confirm_unsaved(SaveChangesKind::Close).await? {
            return Ok(false);
        }
        self.release(&mission).await?;
        Ok(true)
    }

    /// Drop `mission` as the loaded one and rescan the catalogue.
    async fn release(&self, mission: &Mission) -> Result<()> {
        self.finish_mission(mission);
        self.inner.catalogue.set_current(None);
        self.set_current(None).await?;
        mission.dispose();
        self.inner.catalogue.refresh();
        info!(mission = %mission.name(), "Mission unloaded");
        Ok(())
    }

    /// Remove the demo or an empty mission, otherwise take a screenshot.
    fn finish_mission(&self, mission: &Mission) {
        let catalogue = &self.inner.catalogue;
        let demo = catalogue.delete_demo_mission(mission);
        let empty = catalogue.delete_empty_mission(mission);
        if !demo && !empty {
            catalogue.make_screenshot(mission);
        }
    }

    /// Run the save-changes dialog for the loaded mission. Returns whether
    /// the calling operation may go on.
    async fn confirm_unsaved(&self, kind: SaveChangesKind) -> Result<bool> {
        let Some(mission) = self.current_mission() else {
            return Ok(true);
        };
        let items = mission.all_unsaved_items();
        if items.is_empty() {
            return Ok(true);
        }

        let request = SaveChangesRequest {
            kind: if mission.is_demo() {
                SaveChangesKind::Demo
            } else {
                kind
            },
            mission: mission.clone(),
            changed_items: items
                .into_iter()
                .map(|item| ChangedItem {
                    item,
                    needs_save: true,
                })
                .collect(),
        };
        let response = self.inner.services.dialogs.request_save_changes(request).await;
        if !response.should_proceed {
            debug!(mission = %mission.name(), "Save-changes dialog dismissed");
            return Ok(false);
        }

        for changed in &response.changed_items {
            if changed.needs_save && response.should_save_changes {
                self.save_item(&mission, &changed.item)?;
            } else {
                debug!(item = %changed.item.name(), "Discarding changes");
            }
        }

        if response.should_save_changes {
            mission.save()?;
            if response.name != mission.name() {
                self.inner.catalogue.rename_mission(&mission, &response.name)?;
            }
        }
        Ok(true)
    }

    fn save_item(&self, mission: &Mission, item: &UnsavedItem) -> Result<()> {
        match item {
            UnsavedItem::FlightPlan(plan) => mission.save_flight_plan(plan),
            UnsavedItem::Matching(matching) => matching.save(),
        }
    }

    async fn rename_current_internal(&self) -> Result<bool> {
        let Some(mission) = self.current_mission() else {
            return Ok(true);
        };
        let demo = mission.is_demo();
        let localizer = &self.inner.services.localizer;
        let (title, label) = if demo {
            (keys::RENAME_DEMO_TITLE, keys::RENAME_DEMO_LABEL)
        } else {
            (keys::RENAME_TITLE, keys::RENAME_LABEL)
        };

        let catalogue = self.inner.catalogue.clone();
        let request = RenameRequest {
            title: localizer.get(title, &[]),
            label: localizer.get(label, &[]),
            old_name: mission.name(),
            validator: Arc::new(move |name: &str| catalogue.is_valid_mission_name(name)),
        };

        match self.inner.services.dialogs.request_mission_name(request).await {
            Some(name) => {
                self.inner.catalogue.rename_mission(&mission, &name)?;
                self.inner.catalogue.make_default_screenshot(&mission);
                Ok(true)
            }
            None => Ok(!demo),
        }
    }

    fn alert_io_error(&self, e: &SessionError) {
        let text = self
            .inner
            .services
            .localizer
            .get(keys::IO_ERROR, &[e.to_string().as_str()]);
        self.inner.services.notifier.notify(Toast::alert(text));
    }
}
