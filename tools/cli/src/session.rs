//! Interactive menu session.
//!
//! [`Session::handle_line`] is a pure state transition over one line of
//! input; [`Session::run`] owns the I/O and performs the single catalog
//! call each completed command asks for.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::debug;

use drivekeep_common::{FileId, Result};
use drivekeep_storage::{CatalogClient, Progress, UploadRequest};

use crate::display::{listing_lines, progress_line, quota_lines};

pub const MENU: &str = "\nChoose an option:
1. Details
2. List root files
3. List folder files
4. Upload file
5. Download file
6. Exit";

pub const CHOICE_PROMPT: &str = "Enter your choice: ";

pub const INVALID_CHOICE: &str = "Invalid choice.";

const ROOT_HEADER: &str = "Files and folders:";

/// A numbered menu entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Details,
    ListRoot,
    ListFolder,
    Upload,
    Download,
    Exit,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(Self::Details),
            "2" => Some(Self::ListRoot),
            "3" => Some(Self::ListFolder),
            "4" => Some(Self::Upload),
            "5" => Some(Self::Download),
            "6" => Some(Self::Exit),
            _ => None,
        }
    }

    /// Prompts for the arguments this choice collects, in order.
    pub fn prompts(self) -> &'static [&'static str] {
        match self {
            Self::ListFolder => &["Enter folder ID: "],
            Self::Upload => &[
                "Enter file path: ",
                "Enter file name: ",
                "Enter parent folder ID (optional, leave blank for root): ",
            ],
            Self::Download => &["Enter file ID: ", "Enter download path: "],
            Self::Details | Self::ListRoot | Self::Exit => &[],
        }
    }

    /// Build the command from collected arguments.
    ///
    /// # Errors
    /// - `InvalidInput` for a blank ID or file name
    fn into_command(self, args: &[String]) -> Result<Command> {
        let arg = |i: usize| args.get(i).map(String::as_str).unwrap_or_default();

        let command = match self {
            Self::Details => Command::Details,
            Self::ListRoot => Command::ListRoot,
            Self::ListFolder => Command::ListFolder {
                folder_id: FileId::new(arg(0))?,
            },
            Self::Upload => {
                let parent = arg(2).trim();
                let parent_id = if parent.is_empty() {
                    None
                } else {
                    Some(FileId::new(parent)?)
                };
                Command::Upload(UploadRequest::new(arg(0), arg(1))?.with_parent(parent_id))
            }
            Self::Download => Command::Download {
                file_id: FileId::new(arg(0))?,
                destination: PathBuf::from(arg(1)),
            },
            Self::Exit => Command::Exit,
        };
        Ok(command)
    }
}

/// A fully specified request, ready for one catalog call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Details,
    ListRoot,
    ListFolder { folder_id: FileId },
    Upload(UploadRequest),
    Download { file_id: FileId, destination: PathBuf },
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Menu,
    AwaitingArgs { choice: MenuChoice, args: Vec<String> },
    Dispatching(Command),
    Finished,
}

/// What the caller should do after feeding a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Print the message; the session is back at the menu.
    Rejected(String),
    /// Print the prompt and read another argument.
    NeedArg(&'static str),
    /// Perform the command, then call [`Session::complete_dispatch`].
    Dispatch(Command),
    Exit,
}

pub struct Session<'a, C: CatalogClient + ?Sized> {
    catalog: &'a C,
    state: SessionState,
}

impl<'a, C: CatalogClient + ?Sized> Session<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Self {
            catalog,
            state: SessionState::Menu,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The prompt for the next line, if the session is reading input.
    pub fn prompt(&self) -> Option<&'static str> {
        match &self.state {
            SessionState::Menu => Some(CHOICE_PROMPT),
            SessionState::AwaitingArgs { choice, args } => choice.prompts().get(args.len()).copied(),
            SessionState::Dispatching(_) | SessionState::Finished => None,
        }
    }

    /// Advance the state machine by one input line. Performs no I/O.
    pub fn handle_line(&mut self, line: &str) -> Transition {
        let line = line.trim_end_matches(['\r', '\n']);

        match std::mem::replace(&mut self.state, SessionState::Menu) {
            SessionState::Menu => match MenuChoice::parse(line) {
                None => Transition::Rejected(INVALID_CHOICE.to_string()),
                Some(MenuChoice::Exit) => {
                    self.state = SessionState::Finished;
                    Transition::Exit
                }
                Some(choice) => self.collect(choice, Vec::new()),
            },
            SessionState::AwaitingArgs { choice, mut args } => {
                args.push(line.to_string());
                self.collect(choice, args)
            }
            state @ SessionState::Dispatching(_) => {
                self.state = state;
                Transition::Rejected("A command is still running.".to_string())
            }
            SessionState::Finished => {
                self.state = SessionState::Finished;
                Transition::Exit
            }
        }
    }

    fn collect(&mut self, choice: MenuChoice, args: Vec<String>) -> Transition {
        if let Some(prompt) = choice.prompts().get(args.len()).copied() {
            self.state = SessionState::AwaitingArgs { choice, args };
            return Transition::NeedArg(prompt);
        }

        match choice.into_command(&args) {
            Ok(command) => {
                self.state = SessionState::Dispatching(command.clone());
                Transition::Dispatch(command)
            }
            Err(e) => Transition::Rejected(format!("An error occurred: {}", e)),
        }
    }

    /// Return to the menu once a dispatched command has finished.
    pub fn complete_dispatch(&mut self) {
        if matches!(self.state, SessionState::Dispatching(_)) {
            self.state = SessionState::Menu;
        }
    }

    /// Drive the session until the user exits or input ends.
    pub async fn run<R, W>(mut self, mut input: R, out: &mut W) -> io::Result<()>
    where
        R: BufRead,
        W: Write + Send,
    {
        let mut line = String::new();

        loop {
            if self.state == SessionState::Menu {
                writeln!(out, "{}", MENU)?;
            }
            if let Some(prompt) = self.prompt() {
                write!(out, "{}", prompt)?;
                out.flush()?;
            }

            line.clear();
            if input.read_line(&mut line)? == 0 {
                writeln!(out)?;
                self.state = SessionState::Finished;
                return Ok(());
            }

            match self.handle_line(&line) {
                Transition::Rejected(message) => writeln!(out, "{}", message)?,
                Transition::NeedArg(_) => {}
                Transition::Dispatch(command) => {
                    self.dispatch(command, out).await?;
                    self.complete_dispatch();
                }
                Transition::Exit => return Ok(()),
            }
        }
    }

    async fn dispatch<W: Write + Send>(&self, command: Command, out: &mut W) -> io::Result<()> {
        debug!(?command, backend = self.catalog.name(), "Dispatching command");

        let outcome = match command {
            Command::Details => self.catalog.quota().await.map(|quota| quota_lines(&quota)),
            Command::ListRoot => self
                .catalog
                .list(None)
                .await
                .map(|listing| listing_lines(&listing, ROOT_HEADER)),
            Command::ListFolder { folder_id } => {
                let header = format!("Files and folders in folder ID {}:", folder_id);
                self.catalog
                    .list(Some(&folder_id))
                    .await
                    .map(|listing| listing_lines(&listing, &header))
            }
            Command::Upload(request) => self
                .catalog
                .upload(request)
                .await
                .map(|id| vec![format!("File ID: {}", id)]),
            Command::Download {
                file_id,
                destination,
            } => {
                let mut write_error = None;
                let mut on_progress = |progress: Progress| {
                    if write_error.is_none() {
                        if let Err(e) = writeln!(out, "{}", progress_line(progress)) {
                            write_error = Some(e);
                        }
                    }
                };
                let result = self
                    .catalog
                    .download(&file_id, &destination, &mut on_progress)
                    .await;
                if let Some(e) = write_error {
                    return Err(e);
                }
                result.map(|_| vec![format!("File downloaded to {}", destination.display())])
            }
            Command::Exit => Ok(Vec::new()),
        };

        match outcome {
            Ok(lines) => {
                for line in lines {
                    writeln!(out, "{}", line)?;
                }
            }
            Err(e) => writeln!(out, "An error occurred: {}", e)?,
        }
        out.flush()
    }
}
