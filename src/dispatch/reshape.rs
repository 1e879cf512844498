//! Completion and stream reshaping.
//!
//! The small reusable transforms recipes compose:
//!   - lifting every completion convention into the canonical single
//!     awaitable shape
//!   - **intake**: canonical reader + cancellation token → lazy sequence
//!     consumable by a user method
//!   - **outtake**: lazy sequence produced by a user method → canonical
//!     writer, bound to the same cancellation token
//!
//! Intake and outtake suspend only at data availability and observe one
//! cancellation token for the whole call: cancelling aborts in-flight
//! reads/writes promptly instead of draining remaining data.

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::contract::{LightFuture, MethodFuture, MethodStream};
use crate::payload::{Empty, PayloadValue};
use crate::streams::{PayloadReader, PayloadWriter};
use crate::types::{Error, Result};

/// Adapt a lightweight awaitable to a full awaitable.
pub fn light_to_future(light: LightFuture) -> MethodFuture {
    match light {
        LightFuture::Ready(result) => Box::pin(futures::future::ready(result)),
        LightFuture::Pending(fut) => fut,
    }
}

/// Finish a single-value completion into its canonical payload.
///
/// Elided responses synthesize the canonical empty sentinel regardless of
/// what the body returned; otherwise the body must have produced a payload,
/// which is wrapped into its carrier when the declared return is scalar.
pub fn finish_single(
    value: Option<PayloadValue>,
    response_elided: bool,
    wrap: Option<fn(PayloadValue) -> Result<PayloadValue>>,
) -> Result<Option<PayloadValue>> {
    if response_elided {
        return Ok(Some(Box::new(Empty)));
    }
    let payload = value.ok_or_else(|| Error::internal("method body produced no payload"))?;
    match wrap {
        Some(wrap) => Ok(Some(wrap(payload)?)),
        None => Ok(Some(payload)),
    }
}

/// Convert a canonical stream reader into a lazy sequence, bound to the
/// call's cancellation token. The sequence ends at clean end-of-stream and
/// terminates promptly when the token fires.
pub fn intake(reader: Box<dyn PayloadReader>, cancel: CancellationToken) -> MethodStream {
    Box::pin(stream::unfold(
        (reader, cancel),
        |(mut reader, cancel)| async move {
            tokio::select! {
                _ = cancel.cancelled() => None,
                item = reader.next() => item.map(|item| (item, (reader, cancel))),
            }
        },
    ))
}

/// Drain a lazy sequence into a canonical stream writer.
///
/// Production stops promptly when the cancellation token fires; that outcome
/// is reported as `Error::Cancelled`, which transports map to their native
/// cancelled status rather than a fault.
pub async fn outtake(
    mut source: MethodStream,
    writer: &mut dyn PayloadWriter,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        let item = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(Error::cancelled("response stream aborted by caller"));
            }
            item = source.next() => item,
        };
        match item {
            Some(Ok(payload)) => writer.write(payload).await?,
            Some(Err(err)) => return Err(err),
            None => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::downcast_payload;
    use crate::streams::payload_channel;
    use std::time::Duration;

    #[tokio::test]
    async fn intake_yields_items_until_eof() {
        let (mut writer, reader) = payload_channel(4);
        writer.write(Box::new(1u8)).await.unwrap();
        writer.write(Box::new(2u8)).await.unwrap();
        drop(writer);

        let mut seq = intake(Box::new(reader), CancellationToken::new());
        let mut seen = Vec::new();
        while let Some(item) = seq.next().await {
            seen.push(downcast_payload::<u8>(item.unwrap()).unwrap());
        }
        assert_eq!(seen, vec![1, 2]);
    }

    #[tokio::test]
    async fn intake_stops_promptly_on_cancellation() {
        // Writer never closes, so only cancellation can end the sequence.
        let (_writer, reader) = payload_channel(1);
        let cancel = CancellationToken::new();
        let mut seq = intake(Box::new(reader), cancel.clone());

        cancel.cancel();
        let next = tokio::time::timeout(Duration::from_secs(1), seq.next()).await;
        assert!(next.unwrap().is_none());
    }

    #[tokio::test]
    async fn outtake_drains_and_completes() {
        let source: MethodStream = Box::pin(stream::iter(vec![
            Ok(Box::new(10u32) as PayloadValue),
            Ok(Box::new(20u32) as PayloadValue),
        ]));
        let (mut writer, mut reader) = payload_channel(4);

        outtake(source, &mut writer, CancellationToken::new())
            .await
            .unwrap();
        drop(writer);

        let a = reader.next().await.unwrap().unwrap();
        assert_eq!(downcast_payload::<u32>(a).unwrap(), 10);
        let b = reader.next().await.unwrap().unwrap();
        assert_eq!(downcast_payload::<u32>(b).unwrap(), 20);
        assert!(reader.next().await.is_none());
    }

    #[tokio::test]
    async fn outtake_reports_cancellation_as_cancelled() {
        // Pending source: production never finishes on its own.
        let source: MethodStream = Box::pin(stream::pending());
        let (mut writer, _reader) = payload_channel(1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = outtake(source, &mut writer, cancel).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled(_)));
    }

    #[test]
    fn finish_single_synthesizes_empty_sentinel() {
        let out = finish_single(None, true, None).unwrap().unwrap();
        downcast_payload::<Empty>(out).unwrap();
    }

    #[test]
    fn finish_single_requires_payload_when_not_elided() {
        let err = finish_single(None, false, None).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[tokio::test]
    async fn light_future_ready_completes_immediately() {
        let fut = light_to_future(LightFuture::Ready(Ok(Some(Box::new(3u8)))));
        let out = fut.await.unwrap().unwrap();
        assert_eq!(downcast_payload::<u8>(out).unwrap(), 3);
    }
}
