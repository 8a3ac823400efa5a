use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use speechbot::event::{self, SessionId};
use speechbot::voice::{
    CaptureRecognizer, CloudSynthesizer, PlaybackEvent, RecognitionConfig, RecognitionOutcome,
    SpeechToText, TextToSpeech, select_voice,
};
use speechbot::{
    Config, Coordinator, CoordinatorEvent, GeminiClient, NoticeLevel, SpeechInput, SpeechOutput,
};

/// Speechbot - talk to Gemini with your voice
#[derive(Parser)]
#[command(name = "speechbot", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable microphone input and spoken replies
    #[arg(long, env = "SPEECHBOT_DISABLE_VOICE")]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Record one utterance and print the transcript
    TestMic,
    /// Speak text through the output adapter
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// List available voices and the one that would be used
    Voices,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn,speechbot=info",
        1 => "info,speechbot=debug",
        2 => "debug",
        _ => "trace",
    };

    // stdout belongs to the conversation
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.disable_voice);
    tracing::debug!(?config, "loaded configuration");

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic => test_mic(&config).await,
            Command::TestTts { text } => test_tts(&config, &text).await,
            Command::Voices => list_voices(&config),
        };
    }

    repl(&config).await
}

/// Build the speech input adapter, or an unsupported one when voice is off
fn build_input(config: &Config) -> SpeechInput {
    if !config.voice.enabled {
        return SpeechInput::unsupported();
    }
    let Some(key) = config.api_keys.openai.clone() else {
        tracing::info!("OPENAI_API_KEY not set, speech input disabled");
        return SpeechInput::unsupported();
    };

    let recognizer = SpeechToText::new_whisper(key, config.voice.stt_model.clone())
        .and_then(CaptureRecognizer::new);
    match recognizer {
        Ok(recognizer) => SpeechInput::new(
            Box::new(recognizer),
            RecognitionConfig::single_utterance(config.voice.locale.clone()),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "speech input unavailable");
            SpeechInput::unsupported()
        }
    }
}

/// Build the speech output adapter, or an unsupported one when voice is off
fn build_output(config: &Config) -> SpeechOutput {
    if !config.voice.enabled {
        return SpeechOutput::unsupported();
    }
    let Some(key) = config.api_keys.openai.clone() else {
        tracing::info!("OPENAI_API_KEY not set, spoken replies disabled");
        return SpeechOutput::unsupported();
    };

    let synthesizer = TextToSpeech::new_openai(key, config.voice.tts_model.clone())
        .and_then(CloudSynthesizer::new);
    match synthesizer {
        Ok(synthesizer) => SpeechOutput::new(Box::new(synthesizer)),
        Err(e) => {
            tracing::warn!(error = %e, "speech output unavailable");
            SpeechOutput::unsupported()
        }
    }
}

/// Interactive conversation loop
async fn repl(config: &Config) -> anyhow::Result<()> {
    let api_key = config
        .api_keys
        .gemini
        .clone()
        .ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY not set"))?;
    let generator = GeminiClient::new(api_key, &config.generation)?;
    tracing::info!(endpoint = %generator.endpoint(), "using Gemini");

    let (mut coordinator, mut events) =
        Coordinator::new(build_input(config), build_output(config), Arc::new(generator));

    println!("Type a message, or /listen, /done, /stop, /volume, /clear, /quit");
    let mut view = View::default();
    view.render(&mut coordinator);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "/quit" | "/exit" => break,
                    "/listen" => coordinator.start_listening(),
                    "/done" => coordinator.stop_listening(),
                    "/stop" => coordinator.stop_speaking(),
                    "/volume" => coordinator.toggle_volume(),
                    "/clear" => coordinator.clear_conversation(),
                    other => coordinator.submit_utterance(other),
                }
            }
            Some(event) = events.recv() => coordinator.handle_event(event),
        }
        view.render(&mut coordinator);
    }

    Ok(())
}

/// Tracks what the terminal has already shown
#[derive(Default)]
struct View {
    last_message_id: u64,
    banner: Option<String>,
    state: Option<speechbot::ConversationState>,
}

impl View {
    fn render(&mut self, coordinator: &mut Coordinator) {
        for notice in coordinator.drain_notices() {
            match notice.level {
                NoticeLevel::Error => println!("  ! {notice}"),
                NoticeLevel::Info | NoticeLevel::Success => println!("  * {notice}"),
            }
        }

        // A reset restarts ids at the greeting
        if coordinator
            .messages()
            .last()
            .is_some_and(|m| m.id < self.last_message_id)
        {
            self.last_message_id = 0;
        }
        let since = self.last_message_id;
        for message in coordinator
            .messages()
            .iter()
            .filter(|m| m.id > since)
        {
            let who = if message.is_user() { "you" } else { "bot" };
            println!("{who}> {}", message.text);
            self.last_message_id = message.id;
        }

        let banner = coordinator.banner().map(ToString::to_string);
        if banner != self.banner {
            if let Some(text) = &banner {
                println!("[{text}]");
            }
            self.banner = banner;
        }

        let state = coordinator.state();
        if self.state != Some(state) {
            tracing::debug!(%state, "state changed");
            self.state = Some(state);
        }
    }
}

/// Record a single utterance and print what was heard
async fn test_mic(config: &Config) -> anyhow::Result<()> {
    let mut input = build_input(config);
    if !input.is_supported() {
        anyhow::bail!("speech input unavailable (voice disabled or OPENAI_API_KEY not set)");
    }

    let (tx, mut rx) = event::channel();
    let session = SessionId(1);
    input.start_listening(session, &tx)?;
    println!("Listening ({})... speak now", input.config().locale);

    while let Some(event) = rx.recv().await {
        if let CoordinatorEvent::Recognition { outcome, .. } = event {
            input.finish(session);
            match outcome {
                RecognitionOutcome::Transcript(text) => println!("Heard: \"{text}\""),
                RecognitionOutcome::Failed(e) => println!("Recognition failed: {e}"),
                RecognitionOutcome::Ended => println!("Nothing heard"),
            }
            break;
        }
    }

    Ok(())
}

/// Speak `text` and wait until playback ends
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    let mut output = build_output(config);
    if !output.is_supported() {
        anyhow::bail!("speech output unavailable (voice disabled or OPENAI_API_KEY not set)");
    }

    println!("Speaking: \"{text}\"");
    let (tx, mut rx) = event::channel();
    output.speak(SessionId(1), text, 1.0, &tx)?;

    while let Some(event) = rx.recv().await {
        match event {
            CoordinatorEvent::Playback {
                event: PlaybackEvent::Started,
                ..
            } => println!("Playing..."),
            CoordinatorEvent::Playback {
                event: PlaybackEvent::Finished,
                ..
            } => {
                println!("Done. If you heard the speech, TTS is working!");
                break;
            }
            CoordinatorEvent::Playback {
                event: PlaybackEvent::Failed(reason),
                ..
            } => anyhow::bail!("playback failed: {reason}"),
            _ => {}
        }
    }

    Ok(())
}

/// Print the voice list, marking the selected voice
fn list_voices(config: &Config) -> anyhow::Result<()> {
    let mut output = build_output(config);
    if !output.is_supported() {
        anyhow::bail!("speech output unavailable (voice disabled or OPENAI_API_KEY not set)");
    }

    let voices = output.voices().to_vec();
    let selected = select_voice(&voices).map(|v| v.id.clone());
    for voice in &voices {
        let marker = if selected.as_deref() == Some(voice.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{marker} {:<10} {} [{}]", voice.id, voice.name, voice.lang);
    }

    Ok(())
}
