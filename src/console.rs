// ABOUTME: Line-oriented console front end driving a SessionHandle.
// ABOUTME: Parses slash commands, forwards intents, and redraws on refresh signals.

use crate::health::{self, Health};
use crate::view::{render_roster, render_status, Renderer};
use anyhow::Result;
use parley_core::{ClientError, Delivery, RefreshReceiver, SessionHandle};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Models offered by the console; the core passes any name through
pub const MODELS: &[&str] = &["llama3.2", "mistral", "codellama", "neural-chat"];

const HELP: &str = "\
Commands:
  /connect [name]   join the chat (defaults to the configured username)
  /disconnect       leave and clear the session
  /ask <text>       ask the selected model
  /model [name]     show or change the selected model
  /models           list available models
  /who              show online users
  /refresh          redraw now
  /status           connection status (and server health when offline)
  /help             this text
  /quit             exit
Anything else is sent as a chat message.";

/// One line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Connect(Option<String>),
    Disconnect,
    Ask(String),
    Model(Option<String>),
    Models,
    Who,
    Refresh,
    Status,
    Help,
    Quit,
    Say(String),
    Empty,
    Unknown(String),
}

pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Say(line.to_string());
    };

    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };
    let arg = (!rest.is_empty()).then(|| rest.to_string());

    match name {
        "connect" | "join" => Input::Connect(arg),
        "disconnect" | "leave" => Input::Disconnect,
        "ask" => Input::Ask(rest.to_string()),
        "model" => Input::Model(arg),
        "models" => Input::Models,
        "who" => Input::Who,
        "refresh" => Input::Refresh,
        "status" => Input::Status,
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => Input::Unknown(other.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, Clone)]
pub struct ConsoleSettings {
    pub endpoint: String,
    /// Used by a bare `/connect`
    pub username: Option<String>,
    pub health_timeout: Duration,
}

pub struct Console<W> {
    session: SessionHandle,
    settings: ConsoleSettings,
    renderer: Renderer,
    http: reqwest::Client,
    out: W,
}

impl<W: Write> Console<W> {
    pub fn new(session: SessionHandle, settings: ConsoleSettings, out: W) -> Self {
        Self {
            session,
            settings,
            renderer: Renderer::new(),
            http: reqwest::Client::new(),
            out,
        }
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    fn say(&mut self, line: impl AsRef<str>) -> Result<()> {
        writeln!(self.out, "{}", line.as_ref())?;
        Ok(())
    }

    /// Print whatever changed since the last frame
    pub async fn redraw(&mut self) -> Result<()> {
        let state = self.session.snapshot().await?;
        for line in self.renderer.update(&state) {
            self.say(line)?;
        }
        self.out.flush()?;
        Ok(())
    }

    pub async fn show_health(&mut self) -> Result<()> {
        let health =
            health::check(&self.http, &self.settings.endpoint, self.settings.health_timeout).await;
        if let Health::Unreachable(reason) = &health {
            tracing::debug!(%reason, "Relay unreachable");
        }
        self.say(format!("Server status: {}", health))
    }

    pub async fn handle(&mut self, input: Input) -> Result<Flow> {
        match input {
            Input::Empty => {}
            Input::Quit => return Ok(Flow::Quit),
            Input::Help => self.say(HELP)?,
            Input::Unknown(name) => self.say(format!("Unknown command /{}. Try /help.", name))?,
            Input::Connect(name) => {
                let Some(name) = name.or_else(|| self.settings.username.clone()) else {
                    self.say("Please enter a username: /connect <name>")?;
                    return Ok(Flow::Continue);
                };
                let endpoint = self.settings.endpoint.clone();
                match self.session.request_connect(&name, &endpoint).await {
                    Ok(()) => tracing::info!(%endpoint, "Connected from console"),
                    Err(ClientError::Connection(e)) => {
                        self.say(format!("Failed to connect to server: {}", e))?
                    }
                    Err(e) => self.say(e.to_string())?,
                }
                self.session.request_refresh()?;
            }
            Input::Disconnect => {
                self.session.request_disconnect().await?;
                self.session.request_refresh()?;
            }
            Input::Say(text) => {
                let delivery = self.session.send_chat_message(&text).await;
                self.report(delivery)?;
            }
            Input::Ask(text) => {
                let model = self.session.snapshot().await?.selected_model;
                let delivery = self.session.send_model_query(&text, &model).await;
                self.report(delivery)?;
            }
            Input::Model(None) => {
                let model = self.session.snapshot().await?.selected_model;
                self.say(format!("Selected model: {}", model))?;
            }
            Input::Model(Some(model)) => {
                if MODELS.contains(&model.as_str()) {
                    self.session.select_model(&model)?;
                    self.say(format!("Selected model: {}", model))?;
                } else {
                    self.say(format!(
                        "Unknown model '{}'. Available: {}",
                        model,
                        MODELS.join(", ")
                    ))?;
                }
            }
            Input::Models => {
                let selected = self.session.snapshot().await?.selected_model;
                for model in MODELS {
                    let marker = if *model == selected { "*" } else { " " };
                    self.say(format!("{} {}", marker, model))?;
                }
            }
            Input::Who => {
                let state = self.session.snapshot().await?;
                self.say(render_roster(&state))?;
            }
            Input::Refresh => self.session.request_refresh()?,
            Input::Status => {
                let state = self.session.snapshot().await?;
                self.say(render_status(&state))?;
                if !state.is_connected() {
                    self.show_health().await?;
                }
            }
        }
        Ok(Flow::Continue)
    }

    fn report(&mut self, delivery: Result<Delivery, ClientError>) -> Result<()> {
        match delivery {
            Ok(Delivery::Emitted) => Ok(()),
            Ok(Delivery::Dropped) => self.say("Not connected. Use /connect <name> first."),
            Err(ClientError::Validation(reason)) => self.say(format!("Not sent: {}", reason)),
            Err(e) => Err(e.into()),
        }
    }
}

/// Read commands from `input` until EOF or /quit, redrawing on refresh signals
pub async fn run<R, W>(
    mut console: Console<W>,
    mut refresh: RefreshReceiver,
    input: R,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    console.redraw().await?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if console.handle(parse_input(&line)).await? == Flow::Quit {
                    break;
                }
            }
            signal = refresh.recv() => {
                let Some(signal) = signal else {
                    break;
                };
                tracing::trace!(?signal, "Redrawing");
                console.redraw().await?;
            }
        }
    }

    console.session.request_disconnect().await?;
    console.redraw().await?;
    Ok(())
}
