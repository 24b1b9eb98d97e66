//! Query pools.
//!
//! Each pool slot owns one GL query object. Occlusion queries map onto
//! samples-passed queries, timestamps onto `glQueryCounter`. Pipeline
//! statistics have no GL 3.3 counterpart and always read back zero.

use std::sync::{Arc, Weak};

use tracing::{debug, warn};

use ashes_api::{Error, QueryResultFlags, QueryType, Result, ResultCode};

use crate::convert;
use crate::device::DeviceShared;
use crate::registry::{ObjectId, ObjectKind};

pub(crate) struct QueryPoolShared {
    device: Weak<DeviceShared>,
    queries: Vec<u32>,
    query_type: QueryType,
    target: u32,
    id: ObjectId,
}

impl Drop for QueryPoolShared {
    fn drop(&mut self) {
        let Some(device) = self.device.upgrade() else {
            debug!("query pool outlived its device, skipping GL teardown");
            return;
        };
        {
            let lock = device.lock();
            for &query in &self.queries {
                lock.gl().delete_query(query);
            }
        }
        device.registry.unregister(self.id, ObjectKind::QueryPool);
        debug!("destroyed query pool ({} queries)", self.queries.len());
    }
}

/// A fixed-size array of GL query objects.
#[derive(Clone)]
pub struct QueryPool {
    shared: Arc<QueryPoolShared>,
}

impl QueryPool {
    pub(crate) fn new(
        device: &Arc<DeviceShared>,
        query_type: QueryType,
        count: u32,
        precise: bool,
    ) -> Result<Self> {
        if count == 0 {
            return Err(Error::Validation("query pool must hold at least one query".into()));
        }
        if query_type == QueryType::Occlusion && precise && !device.features.occlusion_query_precise
        {
            return Err(Error::FeatureNotPresent("precise occlusion queries"));
        }
        if query_type == QueryType::PipelineStatistics {
            warn!("pipeline statistics queries are not supported, results read back zero");
        }
        let queries = {
            let lock = device.lock();
            (0..count).map(|_| lock.gl().create_query()).collect::<Vec<_>>()
        };
        let id = device.registry.register(ObjectKind::QueryPool);
        debug!("created query pool ({:?}, {} queries)", query_type, count);
        Ok(Self {
            shared: Arc::new(QueryPoolShared {
                device: Arc::downgrade(device),
                queries,
                query_type,
                target: convert::query_target(query_type, precise),
                id,
            }),
        })
    }

    pub fn query_type(&self) -> QueryType {
        self.shared.query_type
    }

    pub fn query_count(&self) -> u32 {
        self.shared.queries.len() as u32
    }

    pub(crate) fn gl_query(&self, index: u32) -> Option<u32> {
        self.shared.queries.get(index as usize).copied()
    }

    pub(crate) fn gl_target(&self) -> u32 {
        self.shared.target
    }

    /// Reads results for a query range into `out`, one value per query,
    /// doubled up with availability words when requested.
    ///
    /// Returns `NotReady` when any query in the range has not landed and
    /// neither `WAIT` nor `PARTIAL` was asked for; unavailable slots are
    /// left untouched in that case.
    pub fn get_results(
        &self,
        first_query: u32,
        query_count: u32,
        out: &mut [u64],
        flags: QueryResultFlags,
    ) -> Result<ResultCode> {
        let end = first_query
            .checked_add(query_count)
            .filter(|&end| end <= self.query_count())
            .ok_or_else(|| {
                Error::Validation(format!(
                    "query range {}..{} exceeds pool of {}",
                    first_query,
                    u64::from(first_query) + u64::from(query_count),
                    self.query_count()
                ))
            })?;
        let with_availability = flags.contains(QueryResultFlags::WITH_AVAILABILITY);
        let stride = if with_availability { 2 } else { 1 };
        if out.len() < query_count as usize * stride {
            return Err(Error::Validation(format!(
                "result slice holds {} values but the read needs {}",
                out.len(),
                query_count as usize * stride
            )));
        }
        let device = self
            .shared
            .device
            .upgrade()
            .ok_or_else(|| Error::DeviceLost("query pool device destroyed".into()))?;
        let lock = device.lock();

        let mut code = ResultCode::Success;
        for (slot, query_index) in (first_query..end).enumerate() {
            let query = self.shared.queries[query_index as usize];
            let available = self.shared.query_type == QueryType::PipelineStatistics
                || lock.gl().query_result_available(query)
                || flags.contains(QueryResultFlags::WAIT);
            let cell = slot * stride;
            if available {
                let value = match self.shared.query_type {
                    // The result read blocks until the query lands.
                    QueryType::Occlusion | QueryType::Timestamp => {
                        lock.gl().query_result_u64(query)
                    }
                    QueryType::PipelineStatistics => 0,
                };
                out[cell] = value;
                if with_availability {
                    out[cell + 1] = 1;
                }
            } else {
                if flags.contains(QueryResultFlags::PARTIAL) {
                    out[cell] = 0;
                }
                if with_availability {
                    out[cell + 1] = 0;
                }
                code = ResultCode::NotReady;
            }
        }
        Ok(code)
    }

    /// Host-side reset. GL queries need no explicit reset; reuse by a
    /// later begin overwrites the stored result.
    pub fn reset(&self, first_query: u32, query_count: u32) -> Result<()> {
        if u64::from(first_query) + u64::from(query_count) > u64::from(self.query_count()) {
            return Err(Error::Validation(format!(
                "query range {}..{} exceeds pool of {}",
                first_query,
                u64::from(first_query) + u64::from(query_count),
                self.query_count()
            )));
        }
        Ok(())
    }
}
