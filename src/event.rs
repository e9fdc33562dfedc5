use crossterm::event::{Event, EventStream, KeyEvent, KeyEventKind};
use futures::StreamExt;

/// Terminal input for the async loop.
pub struct Events {
    stream: EventStream,
}

impl Default for Events {
    fn default() -> Self {
        Self::new()
    }
}

impl Events {
    pub fn new() -> Self {
        Self {
            stream: EventStream::new(),
        }
    }

    /// The next key press. Resize and other events are skipped; `None` once
    /// the terminal stream ends.
    pub async fn next_key(&mut self) -> color_eyre::Result<Option<KeyEvent>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    return Ok(Some(key))
                }
                Some(Ok(_)) => continue,
                Some(Err(err)) => return Err(err.into()),
                None => return Ok(None),
            }
        }
    }
}
