#[macro_use]
extern crate afl;
extern crate ant;

use ant::message::Message;

fn main() {
    fuzz!(|data: &[u8]| {
        let mut pending = data.to_vec();
        let mut msg = Message::new();
        loop {
            if pending.is_empty() {
                break;
            }
            match msg.decode(&pending) {
                Ok(consumed) => {
                    pending.drain(..consumed);
                    let _ = msg.to_typed(None);
                }
                Err(ant::error::MessageError::Incomplete) => break,
                Err(_) => {
                    pending.remove(0);
                }
            }
        }
    });
}
