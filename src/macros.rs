macro_rules! dispatch_format {
    ($vendor:ident, $context:ident: $format:expr => $expr:expr) => {{
        use $crate::link::{Format, LinkContext};

        match $format {
            Format::OpenLud => {
                let $vendor = $crate::vendor::openlud();
                let $context = LinkContext::openlud();
                $expr
            }

            Format::NexFuse => {
                let $vendor = $crate::vendor::nexfuse();
                let $context = LinkContext::nexfuse();
                $expr
            }

            Format::Mercury => {
                let $vendor = $crate::vendor::mercury();
                let $context = LinkContext::mercury();
                $expr
            }

            Format::SolarisVm => {
                let $vendor = $crate::vendor::solarisvm();
                let $context = LinkContext::solarisvm();
                $expr
            }

            Format::Jade => {
                let $vendor = $crate::vendor::jade();
                let $context = LinkContext::jade();
                $expr
            }

            Format::Siax => {
                let $vendor = $crate::vendor::siax();
                let $context = LinkContext::siax();
                $expr
            }
        }
    }};
}
