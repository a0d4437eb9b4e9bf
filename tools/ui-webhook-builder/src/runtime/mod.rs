use crate::errors::BuilderError;
use crate::prompt::{MenuChoice, SelectPrompt, SplashScreen, TerminalPrompter};
use crate::step_identity::StepKey;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Path) -> Result<String, BuilderError>;
    fn write_string(&self, path: &Path, contents: &str) -> Result<(), BuilderError>;
    fn create_dir_all(&self, path: &Path) -> Result<(), BuilderError>;
    fn exists(&self, path: &Path) -> bool;
}

pub trait Terminal: Send + Sync {
    fn stdin_is_tty(&self) -> bool;
    fn write_line(&self, line: &str) -> Result<(), BuilderError>;
}

/// Interactive prompt service. Both calls return `BuilderError::Cancelled`
/// when the operator backs out.
pub trait Prompter: Send + Sync {
    fn splash(&self, screen: &SplashScreen) -> Result<(), BuilderError>;
    fn select(&self, prompt: &SelectPrompt) -> Result<MenuChoice, BuilderError>;
}

pub struct ProductionFileSystem;

impl FileSystem for ProductionFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, BuilderError> {
        std::fs::read_to_string(path)
            .map_err(|e| BuilderError::Io(format!("{}: {e}", path.display())))
    }

    fn write_string(&self, path: &Path, contents: &str) -> Result<(), BuilderError> {
        std::fs::write(path, contents)
            .map_err(|e| BuilderError::Io(format!("{}: {e}", path.display())))
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), BuilderError> {
        std::fs::create_dir_all(path)
            .map_err(|e| BuilderError::Io(format!("{}: {e}", path.display())))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

pub struct ProductionTerminal;

impl Terminal for ProductionTerminal {
    fn stdin_is_tty(&self) -> bool {
        std::io::IsTerminal::is_terminal(&std::io::stdin())
    }

    fn write_line(&self, line: &str) -> Result<(), BuilderError> {
        use std::io::Write;
        let mut out = std::io::stdout();
        writeln!(out, "{line}").map_err(|e| BuilderError::Io(e.to_string()))
    }
}

pub struct ProductionRuntime {
    pub file_system: Arc<dyn FileSystem>,
    pub terminal: Arc<dyn Terminal>,
    pub prompter: Arc<dyn Prompter>,
}

impl ProductionRuntime {
    pub fn new() -> Self {
        Self {
            file_system: Arc::new(ProductionFileSystem),
            terminal: Arc::new(ProductionTerminal),
            prompter: Arc::new(TerminalPrompter),
        }
    }
}

impl Default for ProductionRuntime {
    fn default() -> Self {
        Self::new()
    }
}

// Fakes share state through `Arc` so a clone handed to the runtime can still
// be inspected by the test that built it.

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Default, Clone)]
pub struct FakeFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, String>>>,
    dirs: Arc<Mutex<Vec<PathBuf>>>,
    fail_next: Arc<Mutex<Option<BuilderError>>>,
    fail_writes_to: Arc<Mutex<Option<PathBuf>>>,
}

impl FakeFileSystem {
    pub fn with_file(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        let fs = Self::default();
        lock(&fs.files).insert(path.into(), contents.into());
        fs
    }

    pub fn set_fail_next(&self, error: BuilderError) {
        *lock(&self.fail_next) = Some(error);
    }

    /// Fails every write targeting `path`; reads and other writes succeed.
    pub fn fail_writes_to(&self, path: impl Into<PathBuf>) {
        *lock(&self.fail_writes_to) = Some(path.into());
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<String> {
        lock(&self.files).get(path.as_ref()).cloned()
    }

    pub fn created_dirs(&self) -> Vec<PathBuf> {
        lock(&self.dirs).clone()
    }

    fn maybe_fail(&self) -> Result<(), BuilderError> {
        if let Some(err) = lock(&self.fail_next).take() {
            return Err(err);
        }
        Ok(())
    }
}

impl FileSystem for FakeFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, BuilderError> {
        self.maybe_fail()?;
        lock(&self.files)
            .get(path)
            .cloned()
            .ok_or_else(|| BuilderError::Io(format!("missing file {}", path.display())))
    }

    fn write_string(&self, path: &Path, contents: &str) -> Result<(), BuilderError> {
        self.maybe_fail()?;
        if lock(&self.fail_writes_to).as_deref() == Some(path) {
            return Err(BuilderError::Io(format!(
                "permission denied {}",
                path.display()
            )));
        }
        lock(&self.files).insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), BuilderError> {
        self.maybe_fail()?;
        lock(&self.dirs).push(path.to_path_buf());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        lock(&self.files).contains_key(path)
    }
}

#[derive(Default, Clone)]
pub struct FakeTerminal {
    pub is_tty: bool,
    writes: Arc<Mutex<Vec<String>>>,
}

impl FakeTerminal {
    pub fn new(is_tty: bool) -> Self {
        Self {
            is_tty,
            ..Self::default()
        }
    }

    pub fn written_lines(&self) -> Vec<String> {
        lock(&self.writes).clone()
    }
}

impl Terminal for FakeTerminal {
    fn stdin_is_tty(&self) -> bool {
        self.is_tty
    }

    fn write_line(&self, line: &str) -> Result<(), BuilderError> {
        lock(&self.writes).push(line.to_string());
        Ok(())
    }
}

/// One scripted operator response for [`FakePrompter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedAnswer {
    /// First offered option whose label contains the text.
    Label(String),
    Key(StepKey),
    /// Answers "done" even when the prompt did not offer it.
    Done,
    /// Accepts whatever the prompt pre-selected (first option if none).
    Default,
    Cancel,
}

impl ScriptedAnswer {
    pub fn label(text: impl Into<String>) -> Self {
        Self::Label(text.into())
    }
}

#[derive(Default, Clone)]
pub struct FakePrompter {
    answers: Arc<Mutex<VecDeque<ScriptedAnswer>>>,
    cancel_splash: bool,
    splashes: Arc<Mutex<Vec<SplashScreen>>>,
    prompts: Arc<Mutex<Vec<SelectPrompt>>>,
}

impl FakePrompter {
    pub fn new(answers: impl IntoIterator<Item = ScriptedAnswer>) -> Self {
        Self {
            answers: Arc::new(Mutex::new(answers.into_iter().collect())),
            ..Self::default()
        }
    }

    pub fn cancelling_splash() -> Self {
        Self {
            cancel_splash: true,
            ..Self::default()
        }
    }

    pub fn seen_prompts(&self) -> Vec<SelectPrompt> {
        lock(&self.prompts).clone()
    }

    pub fn seen_splashes(&self) -> Vec<SplashScreen> {
        lock(&self.splashes).clone()
    }

    pub fn remaining_answers(&self) -> usize {
        lock(&self.answers).len()
    }
}

impl Prompter for FakePrompter {
    fn splash(&self, screen: &SplashScreen) -> Result<(), BuilderError> {
        lock(&self.splashes).push(screen.clone());
        if self.cancel_splash {
            return Err(BuilderError::Cancelled);
        }
        Ok(())
    }

    fn select(&self, prompt: &SelectPrompt) -> Result<MenuChoice, BuilderError> {
        lock(&self.prompts).push(prompt.clone());
        let answer = lock(&self.answers).pop_front().ok_or_else(|| {
            BuilderError::Prompt(format!("no scripted answer for '{}'", prompt.title))
        })?;
        match answer {
            ScriptedAnswer::Label(text) => prompt
                .options
                .iter()
                .find(|option| option.label.contains(&text))
                .map(|option| option.choice.clone())
                .ok_or_else(|| {
                    BuilderError::Prompt(format!("no option labelled '{text}' in '{}'", prompt.title))
                }),
            ScriptedAnswer::Key(key) => Ok(MenuChoice::Step(key)),
            ScriptedAnswer::Done => Ok(MenuChoice::Done),
            ScriptedAnswer::Default => prompt
                .default_choice()
                .or_else(|| prompt.options.first().map(|option| &option.choice))
                .cloned()
                .ok_or_else(|| BuilderError::Prompt("prompt has no options".to_string())),
            ScriptedAnswer::Cancel => Err(BuilderError::Cancelled),
        }
    }
}
