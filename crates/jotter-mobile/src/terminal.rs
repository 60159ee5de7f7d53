//! Terminal renderer for the screen models.
//!
//! Screens are printed as text and driven through `dialoguer` prompts, which
//! block and therefore run on the blocking pool.

use std::time::Duration;

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Password, Select};
use jotter_core::auth::AuthProvider;
use jotter_core::repository::NoteRepository;
use jotter_core::routing::{EditorTarget, Route, RoutingGate, Screen};
use jotter_core::NoteId;

use crate::app::App;
use crate::error::AppError;
use crate::navigation::NavStack;
use crate::ui::{ActionOutcome, Alert, Navigation, Prompt};
use crate::views::{
    confirm_sign_out, ListEntry, LoginView, NoteEditorView, NoteListView, NoteViewerView,
    OfflineBanner, ProfileView, SplashView, ViewerState, NOT_FOUND_MESSAGE,
};

const ROUTE_SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

const LIST_ACTIONS: [&str; 7] = [
    "Open a note",
    "New note",
    "Delete a note",
    "Refresh",
    "Profile",
    "Log out",
    "Quit",
];
const EDITOR_ACTIONS: [&str; 2] = ["Save", "Cancel"];
const VIEWER_ACTIONS: [&str; 4] = ["Edit", "Delete", "Back", "Quit"];
const PROFILE_ACTIONS: [&str; 3] = ["Log out", "Back", "Quit"];

/// Interactive prompts on the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct Console;

impl Console {
    pub async fn input(&self, prompt: &str, initial: &str) -> Result<String, AppError> {
        let (prompt, initial) = (prompt.to_string(), initial.to_string());
        interact(move || {
            Input::<String>::with_theme(&ColorfulTheme::default())
                .with_prompt(prompt)
                .with_initial_text(initial)
                .allow_empty(true)
                .interact_text()
        })
        .await
    }

    /// Read a secret without echoing it.
    pub async fn password(&self, prompt: &str) -> Result<String, AppError> {
        let prompt = prompt.to_string();
        interact(move || {
            Password::with_theme(&ColorfulTheme::default())
                .with_prompt(prompt)
                .allow_empty_password(true)
                .interact()
        })
        .await
    }

    pub async fn select<T: ToString>(&self, prompt: &str, items: &[T]) -> Result<usize, AppError> {
        let prompt = prompt.to_string();
        let items: Vec<String> = items.iter().map(ToString::to_string).collect();
        interact(move || {
            Select::with_theme(&ColorfulTheme::default())
                .with_prompt(prompt)
                .items(&items)
                .default(0)
                .interact()
        })
        .await
    }

    /// Pick one of `entries`; `None` when there is nothing to pick.
    async fn choose_note(
        &self,
        prompt: &str,
        entries: &[ListEntry],
    ) -> Result<Option<NoteId>, AppError> {
        if entries.is_empty() {
            println!("No notes to choose from");
            return Ok(None);
        }
        let titles: Vec<&str> = entries.iter().map(|entry| entry.title.as_str()).collect();
        let index = self.select(prompt, &titles).await?;
        Ok(entries.get(index).map(|entry| entry.id))
    }
}

impl Prompt for Console {
    async fn confirm(&self, title: &str, message: &str) -> bool {
        let question = format!("{title}: {message}");
        let answer = interact(move || {
            Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(question)
                .default(false)
                .interact()
        })
        .await;
        answer.unwrap_or_else(|error| {
            tracing::warn!("Failed to read confirmation: {}", error);
            false
        })
    }
}

async fn interact<T, F>(prompt: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce() -> dialoguer::Result<T> + Send + 'static,
{
    Ok(tokio::task::spawn_blocking(prompt).await??)
}

enum Step {
    Stay,
    Navigate(Navigation),
    Quit,
}

/// Drives the app until the user quits.
pub struct Terminal<'a, P: AuthProvider, R: NoteRepository> {
    app: &'a App<P, R>,
    console: Console,
    banner: OfflineBanner,
    stack: NavStack,
    list: Option<NoteListView<R>>,
    focused: Option<Screen>,
}

impl<'a, P: AuthProvider, R: NoteRepository> Terminal<'a, P, R> {
    pub fn new(app: &'a App<P, R>) -> Self {
        Self {
            app,
            console: Console,
            banner: OfflineBanner::attach(app.connectivity()),
            stack: NavStack::default(),
            list: None,
            focused: None,
        }
    }

    pub async fn run(mut self) -> Result<(), AppError> {
        loop {
            let route = self.app.gate().current();
            if self.stack.sync_route(route) && route != Route::Authenticated {
                self.list = None;
            }
            let screen = self.stack.top();
            let gained_focus = self.focused.as_ref() != Some(&screen);
            self.focused = Some(screen.clone());

            if let Some(text) = self.banner.text() {
                println!("[ {text} ]");
            }

            let step = match &screen {
                Screen::Splash => self.splash().await,
                Screen::Login => self.login().await?,
                Screen::NoteList => self.note_list(gained_focus).await?,
                Screen::NoteEditor(target) => self.editor(target.clone()).await?,
                Screen::NoteViewer(id) => self.viewer(*id).await?,
                Screen::Profile => self.profile().await?,
            };

            match step {
                Step::Stay => {}
                Step::Navigate(navigation) => {
                    self.stack.apply(navigation);
                    self.focused = None;
                }
                Step::Quit => return Ok(()),
            }
        }
    }

    async fn splash(&self) -> Step {
        let view = SplashView::new(self.app.gate().clone());
        println!("{}", view.title());
        Step::Navigate(view.wait().await)
    }

    async fn login(&self) -> Result<Step, AppError> {
        let mut view = LoginView::new(self.app.session().clone());
        loop {
            let mode = view.mode();
            let choice = self
                .console
                .select(
                    mode.submit_label(),
                    &[mode.submit_label(), mode.toggle_label(), "Quit"],
                )
                .await?;
            match choice {
                1 => {
                    view.toggle_mode();
                    continue;
                }
                2 => return Ok(Step::Quit),
                _ => {}
            }

            view.email = self.console.input("Email", &view.email).await?;
            view.password = self.console.password("Password").await?;

            if let Some(alert) = view.submit().await {
                show(&alert);
            }
            if self.app.session().current().is_signed_in() {
                settle_route(self.app.gate(), Route::Authenticated).await;
                return Ok(Step::Stay);
            }
        }
    }

    async fn note_list(&mut self, gained_focus: bool) -> Result<Step, AppError> {
        let view = self
            .list
            .get_or_insert_with(|| NoteListView::new(self.app.notes().clone()));
        if gained_focus {
            view.load().await;
        } else {
            view.sync_changes().await;
        }
        if let Some(alert) = view.take_alert() {
            show(&alert);
        }

        println!("\n== My Notes ==");
        let entries = view.entries();
        for (index, entry) in entries.iter().enumerate() {
            println!("{:>3}. {}", index + 1, entry.title);
            println!("     {}", entry.preview);
        }
        if let Some(message) = view.empty_message() {
            println!("{message}");
        }

        let step = match self.console.select("My Notes", &LIST_ACTIONS).await? {
            0 => match self.console.choose_note("Open", &entries).await? {
                Some(id) => Step::Navigate(NoteListView::<R>::open(id)),
                None => Step::Stay,
            },
            1 => Step::Navigate(NoteListView::<R>::new_note()),
            2 => {
                if let Some(id) = self.console.choose_note("Delete", &entries).await? {
                    report(&view.delete(id, &self.console).await);
                }
                Step::Stay
            }
            3 => {
                view.refresh().await;
                Step::Stay
            }
            4 => Step::Navigate(NoteListView::<R>::open_profile()),
            5 => {
                let outcome = confirm_sign_out(self.app.session(), &self.console).await;
                self.finish_sign_out(outcome).await
            }
            _ => Step::Quit,
        };
        Ok(step)
    }

    async fn editor(&self, target: EditorTarget) -> Result<Step, AppError> {
        let mut view = NoteEditorView::new(self.app.notes().clone(), target);
        if let Some(alert) = view.load().await {
            show(&alert);
            return Ok(Step::Navigate(Navigation::Back));
        }

        println!("\n== {} ==", view.heading());
        view.title = self.console.input("Title", &view.title).await?;
        view.content = self.console.input("Content", &view.content).await?;

        if self.console.select("Save changes?", &EDITOR_ACTIONS).await? != 0 {
            return Ok(Step::Navigate(Navigation::Back));
        }

        let outcome = view.save().await;
        report(&outcome);
        Ok(outcome
            .navigation()
            .cloned()
            .map_or(Step::Stay, Step::Navigate))
    }

    async fn viewer(&self, id: NoteId) -> Result<Step, AppError> {
        let mut view = NoteViewerView::new(self.app.notes().clone(), id);
        view.load().await;

        match view.state() {
            ViewerState::Loading => return Ok(Step::Stay),
            ViewerState::NotFound => {
                println!("{NOT_FOUND_MESSAGE}");
                return Ok(Step::Navigate(Navigation::Back));
            }
            ViewerState::Failed(alert) => {
                show(alert);
                return Ok(Step::Navigate(Navigation::Back));
            }
            ViewerState::Loaded(note) => {
                println!("\n== {} ==", note.title);
                println!("{}", view.body().unwrap_or_default());
            }
        }

        let step = match self.console.select("Note", &VIEWER_ACTIONS).await? {
            0 => Step::Navigate(view.edit()),
            1 => {
                let outcome = view.delete(&self.console).await;
                report(&outcome);
                outcome
                    .navigation()
                    .cloned()
                    .map_or(Step::Stay, Step::Navigate)
            }
            2 => Step::Navigate(Navigation::Back),
            _ => Step::Quit,
        };
        Ok(step)
    }

    async fn profile(&self) -> Result<Step, AppError> {
        let view = ProfileView::new(self.app.session().clone());
        println!("\n== Profile ==");
        println!("Email:        {}", view.email());
        println!("User ID:      {}", view.user_id());
        println!("Last sign in: {}", view.last_sign_in());

        let step = match self.console.select("Profile", &PROFILE_ACTIONS).await? {
            0 => {
                let outcome = view.log_out(&self.console).await;
                self.finish_sign_out(outcome).await
            }
            1 => Step::Navigate(Navigation::Back),
            _ => Step::Quit,
        };
        Ok(step)
    }

    async fn finish_sign_out(&self, outcome: ActionOutcome) -> Step {
        report(&outcome);
        match outcome.navigation() {
            Some(navigation) => {
                settle_route(self.app.gate(), Route::Unauthenticated).await;
                Step::Navigate(navigation.clone())
            }
            None => Step::Stay,
        }
    }
}

/// Give the routing gate a moment to follow a session change.
async fn settle_route(gate: &RoutingGate, route: Route) {
    let mut routes = gate.watch();
    let settled = tokio::time::timeout(
        ROUTE_SETTLE_TIMEOUT,
        routes.wait_for(|current| *current == route),
    )
    .await;
    if !matches!(settled, Ok(Ok(_))) {
        tracing::warn!("Routing gate did not reach {:?}", route);
    }
}

fn show(alert: &Alert) {
    println!("\n{}: {}", alert.title, alert.message);
}

fn report(outcome: &ActionOutcome) {
    if let Some(alert) = outcome.alert() {
        show(alert);
    }
}
