//! One-shot async reads: static assets over fetch, local files via FileReader

use std::cell::RefCell;
use std::rc::Rc;

use futures_channel::oneshot;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{window, Event, File, FileReader, Response};

use crate::error::{js_error_message, UiError};

/// Fetch a same-origin asset and return its body.
pub async fn fetch_bytes(path: &str) -> Result<Vec<u8>, UiError> {
    let win = window().ok_or(UiError::NoWindow)?;

    let response = JsFuture::from(win.fetch_with_str(path))
        .await
        .map_err(UiError::from_js)?
        .dyn_into::<Response>()
        .map_err(UiError::from_js)?;

    if !response.ok() {
        return Err(UiError::HttpStatus {
            path: path.to_string(),
            status: response.status(),
        });
    }

    let buffer = JsFuture::from(response.array_buffer().map_err(UiError::from_js)?)
        .await
        .map_err(UiError::from_js)?;
    Ok(js_sys::Uint8Array::new(&buffer).to_vec())
}

type ReadResult = Result<Vec<u8>, UiError>;
type ReadSender = Rc<RefCell<Option<oneshot::Sender<ReadResult>>>>;

fn settle(sender: &ReadSender, result: ReadResult) {
    if let Some(tx) = sender.borrow_mut().take() {
        let _ = tx.send(result);
    }
}

/// Read `file` through `reader`.
///
/// Calling `abort()` on the reader resolves the read with
/// [`UiError::ReadCancelled`].
pub async fn read_file(reader: &FileReader, file: &File) -> Result<Vec<u8>, UiError> {
    let (tx, rx) = oneshot::channel::<ReadResult>();
    let sender: ReadSender = Rc::new(RefCell::new(Some(tx)));

    let onload: Closure<dyn FnMut(Event)> = {
        let sender = sender.clone();
        let reader = reader.clone();
        Closure::once(move |_: Event| {
            let result = reader
                .result()
                .map(|buffer| js_sys::Uint8Array::new(&buffer).to_vec())
                .map_err(|e| UiError::FileRead(js_error_message(&e)));
            settle(&sender, result);
        })
    };
    let onerror: Closure<dyn FnMut(Event)> = {
        let sender = sender.clone();
        let reader = reader.clone();
        Closure::once(move |_: Event| {
            let message = reader
                .error()
                .map_or_else(|| "unknown error".to_string(), |e| e.message());
            settle(&sender, Err(UiError::FileRead(message)));
        })
    };
    let onabort: Closure<dyn FnMut(Event)> = {
        let sender = sender.clone();
        Closure::once(move |_: Event| {
            sender.borrow_mut().take();
        })
    };

    reader.set_onload(Some(onload.as_ref().unchecked_ref()));
    reader.set_onerror(Some(onerror.as_ref().unchecked_ref()));
    reader.set_onabort(Some(onabort.as_ref().unchecked_ref()));

    let started = reader.read_as_array_buffer(file).map_err(UiError::from_js);
    let result = match started {
        Ok(()) => rx.await.unwrap_or(Err(UiError::ReadCancelled)),
        Err(e) => Err(e),
    };

    reader.set_onload(None);
    reader.set_onerror(None);
    reader.set_onabort(None);
    result
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use wasm_bindgen_futures::spawn_local;
    use wasm_bindgen_test::wasm_bindgen_test;

    use super::*;

    fn file(bytes: &[u8]) -> File {
        let parts = js_sys::Array::of1(&js_sys::Uint8Array::from(bytes));
        File::new_with_u8_array_sequence(&parts, "leaf.png").unwrap()
    }

    async fn next_tick() {
        JsFuture::from(js_sys::Promise::resolve(&JsValue::UNDEFINED))
            .await
            .unwrap();
    }

    #[wasm_bindgen_test]
    async fn test_read_file_returns_contents() {
        let reader = FileReader::new().unwrap();
        let bytes = read_file(&reader, &file(b"\x89PNG leaf")).await.unwrap();
        assert_eq!(bytes, b"\x89PNG leaf");
    }

    #[wasm_bindgen_test]
    async fn test_aborted_read_is_cancelled() {
        let reader = FileReader::new().unwrap();
        let (tx, rx) = oneshot::channel();
        {
            let reader = reader.clone();
            let file = file(&[7; 4096]);
            spawn_local(async move {
                let _ = tx.send(read_file(&reader, &file).await);
            });
        }

        for _ in 0..16 {
            if reader.ready_state() == FileReader::LOADING {
                break;
            }
            next_tick().await;
        }
        assert_eq!(reader.ready_state(), FileReader::LOADING);
        reader.abort();

        let result = rx.await.unwrap();
        assert!(matches!(result, Err(UiError::ReadCancelled)), "{result:?}");
        // handlers are detached once the read settles
        assert!(reader.onabort().is_none());
    }
}
