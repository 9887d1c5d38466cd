// SPDX-License-Identifier: CEPL-1.0
use ash::vk;

/// Queue families found on one candidate device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub drawing: Option<u32>,
    pub presentation: Option<u32>,
}

/// Both families resolved. Drawing and presentation may be the same family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub drawing: u32,
    pub presentation: u32,
}

impl QueueFamilyIndices {
    pub fn complete(&self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            drawing: self.drawing?,
            presentation: self.presentation?,
        })
    }
}

impl QueueFamilies {
    pub fn is_shared(&self) -> bool {
        self.drawing == self.presentation
    }

    /// Distinct family indices, drawing first.
    pub fn unique(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.drawing]
        } else {
            vec![self.drawing, self.presentation]
        }
    }
}

/// Walks `families` in index order.
///
/// With a `can_present` query, the first family that can present is
/// recorded as the presentation family. The first GRAPHICS family becomes
/// the drawing family and ends the walk, so a presentation-only family
/// after it is never seen.
pub fn find_queue_families<E, F>(
    families: &[vk::QueueFamilyProperties],
    mut can_present: Option<F>,
) -> Result<QueueFamilyIndices, E>
where
    F: FnMut(u32) -> Result<bool, E>,
{
    let mut found = QueueFamilyIndices::default();

    for (i, family) in families.iter().enumerate() {
        let index = i as u32;

        if found.presentation.is_none() {
            if let Some(query) = can_present.as_mut() {
                if query(index)? {
                    found.presentation = Some(index);
                }
            }
        }

        if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            found.drawing = Some(index);
            break;
        }
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn presents(at: &'static [u32]) -> Option<impl FnMut(u32) -> Result<bool, Infallible>> {
        Some(move |i: u32| Ok(at.contains(&i)))
    }

    #[test]
    fn single_family_does_both() {
        let fams = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)];
        let found = find_queue_families(&fams, presents(&[0])).unwrap();
        assert_eq!(
            found.complete(),
            Some(QueueFamilies {
                drawing: 0,
                presentation: 0,
            })
        );
        assert!(found.complete().unwrap().is_shared());
    }

    #[test]
    fn separate_present_family_before_graphics() {
        let fams = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let found = find_queue_families(&fams, presents(&[1, 2])).unwrap();
        let both = found.complete().unwrap();
        assert_eq!(both.drawing, 2);
        assert_eq!(both.presentation, 1);
        assert_eq!(both.unique(), vec![2, 1]);
    }

    #[test]
    fn walk_stops_at_first_graphics_family() {
        let fams = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::COMPUTE),
        ];
        let found = find_queue_families(&fams, presents(&[1])).unwrap();
        assert_eq!(found.drawing, Some(0));
        assert_eq!(found.presentation, None);
        assert_eq!(found.complete(), None);
    }

    #[test]
    fn first_presenting_family_wins() {
        let fams = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let found = find_queue_families(&fams, presents(&[0, 1, 2])).unwrap();
        assert_eq!(found.presentation, Some(0));
    }

    #[test]
    fn no_graphics_family_is_not_an_error() {
        let fams = [family(vk::QueueFlags::COMPUTE)];
        let found = find_queue_families(&fams, presents(&[0])).unwrap();
        assert_eq!(found.drawing, None);
        assert_eq!(found.presentation, Some(0));
    }

    #[test]
    fn presentation_not_required() {
        let fams = [family(vk::QueueFlags::GRAPHICS)];
        let none: Option<fn(u32) -> Result<bool, Infallible>> = None;
        let found = find_queue_families(&fams, none).unwrap();
        assert_eq!(found.drawing, Some(0));
        assert_eq!(found.presentation, None);
    }

    #[test]
    fn query_errors_propagate() {
        let fams = [family(vk::QueueFlags::GRAPHICS)];
        let failing = Some(|_: u32| Err::<bool, _>(vk::Result::ERROR_SURFACE_LOST_KHR));
        assert_eq!(
            find_queue_families(&fams, failing),
            Err(vk::Result::ERROR_SURFACE_LOST_KHR)
        );
    }
}
