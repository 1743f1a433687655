//! Process command line for the simulation binary.

use std::fmt;

use emodkit_kernel::asset::entry::join_relative;

/// Target-platform facts the command line depends on.
pub trait Platform: fmt::Debug + Send + Sync {
    fn is_windows(&self) -> bool;

    /// Tokens placed before the executable (container runner, MPI launcher).
    fn command_wrapper(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Platform description for the machine (or an explicitly chosen target).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPlatform {
    windows: bool,
    wrapper: Vec<String>,
}

impl Default for LocalPlatform {
    fn default() -> Self {
        Self {
            windows: cfg!(windows),
            wrapper: Vec::new(),
        }
    }
}

impl LocalPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_windows(mut self, windows: bool) -> Self {
        self.windows = windows;
        self
    }

    #[must_use]
    pub fn with_wrapper<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.wrapper = tokens.into_iter().map(Into::into).collect();
        self
    }
}

impl Platform for LocalPlatform {
    fn is_windows(&self) -> bool {
        self.windows
    }

    fn command_wrapper(&self) -> Vec<String> {
        self.wrapper.clone()
    }
}

/// Inputs for [`CommandLine::build`].
#[derive(Debug, Clone)]
pub struct LaunchSpec<'a> {
    pub executable: &'a str,
    pub assets_dir: &'a str,
    pub config_filename: &'a str,
    /// Script folder (inside the assets dir) followed by extra search paths;
    /// `None` when embedded scripts are off.
    pub script_paths: Option<(&'a str, &'a [String])>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    wrapper: Vec<String>,
    executable: String,
    options: Vec<(String, String)>,
}

impl CommandLine {
    /// `[wrapper] <exe> --config <cfg> --dll-path <assets>
    /// [--python-script-path <a;b>] --input-path <assets;.>`
    #[must_use]
    pub fn build(platform: &dyn Platform, launch: &LaunchSpec<'_>) -> Self {
        let sep = if platform.is_windows() { '\\' } else { '/' };
        let assets = join_relative(".", launch.assets_dir, sep);

        let mut options = vec![
            ("--config".to_string(), launch.config_filename.to_string()),
            ("--dll-path".to_string(), assets.clone()),
        ];
        if let Some((folder, extra)) = launch.script_paths {
            let mut paths = vec![join_relative(&assets, folder, sep)];
            paths.extend(extra.iter().cloned());
            options.push(("--python-script-path".to_string(), paths.join(";")));
        }
        options.push(("--input-path".to_string(), format!("{assets};.")));

        Self {
            wrapper: platform.command_wrapper(),
            executable: join_relative(launch.assets_dir, launch.executable, sep),
            options,
        }
    }

    #[must_use]
    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// Value of `--<name>`, if present.
    #[must_use]
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(flag, _)| flag == name)
            .map(|(_, v)| v.as_str())
    }

    /// Argument vector, wrapper first.
    #[must_use]
    pub fn tokens(&self) -> Vec<String> {
        let mut tokens = self.wrapper.clone();
        tokens.push(self.executable.clone());
        for (flag, value) in &self.options {
            tokens.push(flag.clone());
            tokens.push(value.clone());
        }
        tokens
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens().join(" "))
    }
}
