//! Marker pagination over repeated invocations of one descriptor.

use crate::invoke::Invoker;
use crate::request::RequestDescriptor;
use crate::response::ParsedResponse;
use crate::Result;

/// Paginator drives a marker-paginated listing: it re-issues the descriptor
/// with the continuation marker from the previous page until the service
/// stops returning one.
///
/// A page whose marker equals the marker that requested it would loop
/// forever; the paginator treats that as the end of the listing.
pub struct Paginator<T, F, M>
where
    F: Fn(&ParsedResponse) -> Vec<T>,
    M: Fn(&ParsedResponse) -> Option<String>,
{
    invoker: Invoker,
    desc: RequestDescriptor,
    marker_param: String,
    extract_items: F,
    extract_marker: M,
    last_marker: Option<String>,
    done: bool,
}

impl<T, F, M> Paginator<T, F, M>
where
    F: Fn(&ParsedResponse) -> Vec<T>,
    M: Fn(&ParsedResponse) -> Option<String>,
{
    pub(crate) fn new(
        invoker: Invoker,
        desc: RequestDescriptor,
        marker_param: String,
        extract_items: F,
        extract_marker: M,
    ) -> Self {
        Self {
            invoker,
            desc,
            marker_param,
            extract_items,
            extract_marker,
            last_marker: None,
            done: false,
        }
    }

    /// Fetch the next page, or `None` once the listing is exhausted.
    ///
    /// Each page goes through the invoker's full retry handling; an error
    /// here means the attempt budget for that page ran out.
    pub async fn next_page(&mut self) -> Result<Option<Vec<T>>> {
        if self.done {
            return Ok(None);
        }

        let mut desc = self.desc.clone();
        if let Some(marker) = &self.last_marker {
            desc.set_param(self.marker_param.as_str(), marker.as_str());
        }

        let resp = self.invoker.invoke(&desc).await?;
        let items = (self.extract_items)(&resp);

        match (self.extract_marker)(&resp) {
            None => self.done = true,
            Some(next) if Some(&next) == self.last_marker.as_ref() => {
                log::warn!(
                    "listing of `{}` repeated marker `{next}`, stopping",
                    self.desc.service()
                );
                self.done = true;
            }
            Some(next) => self.last_marker = Some(next),
        }

        Ok(Some(items))
    }

    /// Drain the listing into one vector.
    pub async fn collect(mut self) -> Result<Vec<T>> {
        let mut all = Vec::new();
        while let Some(page) = self.next_page().await? {
            all.extend(page);
        }
        Ok(all)
    }
}
