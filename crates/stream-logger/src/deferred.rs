// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Single-assignment result handles.
//!
//! [`deferred`] splits a pending result into a [`Resolver`], held by whoever
//! eventually produces the value, and a [`Waiter`], awaited by the caller.
//! Resolving consumes the resolver, so a handle can never be settled twice:
//! the at-most-once rule is enforced by the compiler rather than checked at
//! runtime. A resolver dropped without being settled completes its waiter
//! with [`LoggerError::WaiterAbandoned`], so no waiter stays pending forever.

use crate::error::LoggerError;
use std::fmt::{self, Debug};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::debug;

type Outcome<T> = Result<T, LoggerError>;

/// Creates a linked resolver/waiter pair.
pub fn deferred<T>() -> (Resolver<T>, Waiter<T>) {
    let (tx, rx) = oneshot::channel();
    (Resolver { tx }, Waiter { rx })
}

pub struct Resolver<T> {
    tx: oneshot::Sender<Outcome<T>>,
}

impl<T> Resolver<T> {
    /// Completes the waiter with `value`. Returns `false` if the waiter was
    /// already dropped.
    pub fn resolve(self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Completes the waiter with `error`. Returns `false` if the waiter was
    /// already dropped.
    pub fn reject(self, error: LoggerError) -> bool {
        self.settle(Err(error))
    }

    /// Whether the waiter is still around to receive a result.
    pub fn is_waiting(&self) -> bool {
        !self.tx.is_closed()
    }

    fn settle(self, outcome: Outcome<T>) -> bool {
        if self.tx.send(outcome).is_err() {
            debug!("Waiter dropped before its result was delivered");
            return false;
        }
        true
    }
}

impl<T> Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resolver")
    }
}

/// Future completing with the value given to the linked [`Resolver`].
pub struct Waiter<T> {
    rx: oneshot::Receiver<Outcome<T>>,
}

impl<T> Future for Waiter<T> {
    type Output = Outcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(LoggerError::WaiterAbandoned)))
    }
}

impl<T> Debug for Waiter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Waiter")
    }
}
