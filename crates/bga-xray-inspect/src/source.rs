use bga_xray_core::GrayImageView;

use crate::result::ResultShape;

/// An additional producer of result shapes, such as a learned object detector.
///
/// The caller owns the source and hands it to
/// [`Inspector::inspect_with_source`](crate::Inspector::inspect_with_source)
/// per call. Returned shapes are appended to the engine's own results with
/// [`Provenance::External`](crate::Provenance::External).
pub trait CandidateSource {
    fn detect(&self, image: &GrayImageView<'_>) -> Vec<ResultShape>;
}

impl<F> CandidateSource for F
where
    F: Fn(&GrayImageView<'_>) -> Vec<ResultShape>,
{
    fn detect(&self, image: &GrayImageView<'_>) -> Vec<ResultShape> {
        self(image)
    }
}
