//! One-shot bridge from callback completion to an awaitable value.
//!
//! [`resolvers`] hands out a [`Resolve`] handle, a [`Reject`] handle and the
//! [`Promise`] they settle. The first settlement wins; any later call on
//! either handle is ignored.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::sync::oneshot;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromiseError<E> {
  #[error("promise rejected: {0}")]
  Rejected(E),

  /// Every settling handle was dropped before the promise settled.
  #[error("promise abandoned without being settled")]
  Abandoned,
}

type Slot<T, E> = Arc<Mutex<Option<oneshot::Sender<Result<T, E>>>>>;

/// Settles the promise with a value.
pub struct Resolve<T, E> {
  slot: Slot<T, E>,
}

/// Settles the promise with an error.
pub struct Reject<T, E> {
  slot: Slot<T, E>,
}

/// Future side of [`resolvers`].
pub struct Promise<T, E> {
  rx: oneshot::Receiver<Result<T, E>>,
}

pub struct Resolvers<T, E> {
  pub resolve: Resolve<T, E>,
  pub reject: Reject<T, E>,
  pub promise: Promise<T, E>,
}

pub fn resolvers<T, E>() -> Resolvers<T, E> {
  let (tx, rx) = oneshot::channel();
  let slot = Arc::new(Mutex::new(Some(tx)));

  Resolvers {
    resolve: Resolve { slot: slot.clone() },
    reject: Reject { slot },
    promise: Promise { rx },
  }
}

/// Returns true if this call settled the promise.
fn settle<T, E>(slot: &Slot<T, E>, outcome: Result<T, E>) -> bool {
  let sender = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
  match sender {
    // A dropped promise still counts as settled from the caller's side.
    Some(tx) => {
      let _ = tx.send(outcome);
      true
    }
    None => false,
  }
}

impl<T, E> Resolve<T, E> {
  pub fn resolve(&self, value: T) -> bool {
    settle(&self.slot, Ok(value))
  }
}

impl<T, E> Reject<T, E> {
  pub fn reject(&self, error: E) -> bool {
    settle(&self.slot, Err(error))
  }
}

impl<T, E> Clone for Resolve<T, E> {
  fn clone(&self) -> Self {
    Self { slot: self.slot.clone() }
  }
}

impl<T, E> Clone for Reject<T, E> {
  fn clone(&self) -> Self {
    Self { slot: self.slot.clone() }
  }
}

impl<T, E> Future for Promise<T, E> {
  type Output = Result<T, PromiseError<E>>;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    Pin::new(&mut self.rx).poll(cx).map(|received| match received {
      Ok(Ok(value)) => Ok(value),
      Ok(Err(error)) => Err(PromiseError::Rejected(error)),
      Err(_) => Err(PromiseError::Abandoned),
    })
  }
}
