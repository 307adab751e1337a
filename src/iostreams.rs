use std::io::{BufRead, Write};

use anyhow::Result;

pub struct IoStreams {
    pub stdin: Box<dyn BufRead + Send + Sync>,
    pub out: Box<dyn Write + Send + Sync>,
    pub err_out: Box<dyn Write + Send + Sync>,

    color_enabled: bool,

    progress_indicator_enabled: bool,
    progress_indicator: Option<terminal_spinners::SpinnerHandle>,

    stdin_tty_override: bool,
    stdin_is_tty: bool,
    stdout_tty_override: bool,
    stdout_is_tty: bool,

    never_prompt: bool,
}

impl IoStreams {
    pub fn color_enabled(&self) -> bool {
        self.color_enabled
    }

    #[cfg(test)]
    pub fn set_color_enabled(&mut self, color_enabled: bool) {
        self.color_enabled = color_enabled;
    }

    #[cfg(test)]
    pub fn set_stdin_tty(&mut self, is_tty: bool) {
        self.stdin_tty_override = true;
        self.stdin_is_tty = is_tty;
    }

    pub fn is_stdin_tty(&self) -> bool {
        if self.stdin_tty_override {
            return self.stdin_is_tty;
        }

        atty::is(atty::Stream::Stdin)
    }

    pub fn set_stdout_tty(&mut self, is_tty: bool) {
        self.stdout_tty_override = true;
        self.stdout_is_tty = is_tty;
    }

    pub fn is_stdout_tty(&self) -> bool {
        if self.stdout_tty_override {
            return self.stdout_is_tty;
        }

        atty::is(atty::Stream::Stdout)
    }

    pub fn can_prompt(&self) -> bool {
        if self.never_prompt {
            return false;
        }

        self.is_stdin_tty() && self.is_stdout_tty()
    }

    pub fn set_never_prompt(&mut self, never_prompt: bool) {
        self.never_prompt = never_prompt;
    }

    /// Print `prompt` and read one line of input, without its line ending.
    ///
    /// Returns `None` once input is exhausted.
    pub fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.out, "{}", prompt)?;
        self.out.flush()?;

        let mut line = String::new();
        if self.stdin.read_line(&mut line)? == 0 {
            // Keep the next output off the prompt line.
            writeln!(self.out)?;
            return Ok(None);
        }

        Ok(Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
    }

    pub fn start_process_indicator_with_label(&mut self, label: &str) {
        if !self.progress_indicator_enabled {
            return;
        }

        // Only one spinner at a time.
        self.stop_process_indicator();

        let mut pi = terminal_spinners::SpinnerBuilder::new().spinner(&terminal_spinners::DOTS11);
        if !label.is_empty() {
            pi = pi.text(format!(" {}", label));
        }

        self.progress_indicator = Some(pi.start());
    }

    pub fn stop_process_indicator(&mut self) {
        if let Some(pi) = self.progress_indicator.take() {
            pi.done();
        }
    }

    pub fn color_scheme(&self) -> crate::colors::ColorScheme {
        crate::colors::ColorScheme::new(self.color_enabled())
    }

    pub fn write_json(&mut self, json: &serde_json::Value) -> Result<()> {
        if self.color_enabled() {
            writeln!(self.out, "{}", colored_json::to_colored_json_auto(json)?)?;
        } else {
            writeln!(self.out, "{}", serde_json::to_string_pretty(json)?)?;
        }

        Ok(())
    }

    pub fn write_yaml(&mut self, value: &serde_json::Value) -> Result<()> {
        write!(self.out, "{}", serde_yaml::to_string(value)?)?;

        Ok(())
    }

    pub fn system() -> Self {
        let stdout_is_tty = atty::is(atty::Stream::Stdout);
        let stderr_is_tty = atty::is(atty::Stream::Stderr);

        if stdout_is_tty {
            // On Windows 10, the application must enable ANSI support first.
            #[cfg(windows)]
            let _ = ansi_term::enable_ansi_support();
            #[cfg(windows)]
            let _ = colored_json::enable_ansi_support();
        }

        let mut io = IoStreams {
            stdin: Box::new(std::io::BufReader::new(std::io::stdin())),
            out: Box::new(std::io::stdout()),
            err_out: Box::new(std::io::stderr()),
            color_enabled: crate::colors::env_color_forced() || (!crate::colors::env_color_disabled() && stdout_is_tty),

            progress_indicator_enabled: false,
            progress_indicator: None,

            stdin_tty_override: false,
            stdin_is_tty: false,
            stdout_tty_override: false,
            stdout_is_tty: false,

            never_prompt: false,
        };

        if stdout_is_tty && stderr_is_tty {
            io.progress_indicator_enabled = true;
        }

        // Prevent duplicate is_terminal queries now that we know the answer.
        io.set_stdout_tty(stdout_is_tty);

        io
    }

    #[cfg(test)]
    pub fn test() -> (Self, String, String) {
        let mut io = IoStreams::system();

        let (stdout, stdout_path) = tempfile::NamedTempFile::new().unwrap().keep().unwrap();
        let (stderr, stderr_path) = tempfile::NamedTempFile::new().unwrap().keep().unwrap();

        io.stdin = Box::new(std::io::Cursor::new(String::new()));
        io.out = Box::new(stdout);
        io.err_out = Box::new(stderr);
        io.progress_indicator_enabled = false;
        io.set_stdin_tty(false);
        io.set_stdout_tty(false);

        (
            io,
            stdout_path.into_os_string().into_string().unwrap(),
            stderr_path.into_os_string().into_string().unwrap(),
        )
    }
}
